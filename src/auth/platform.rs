use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resource for actions that do not target a single ride.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Platform {
    id: Uuid,
}

impl PolarClass for Platform {
    fn get_polar_class_builder() -> oso::ClassBuilder<Platform> {
        oso::Class::builder()
            .name("Platform")
            .add_attribute_getter("id", |recv: &Platform| recv.id.to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Platform::get_polar_class_builder();
        builder.build()
    }
}
