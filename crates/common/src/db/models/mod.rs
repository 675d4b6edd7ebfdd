//! SeaORM entity models
//!
//! Database entities for UnitForge

mod unit;

pub use unit::{
    Entity as UnitEntity,
    Model as Unit,
    ActiveModel as UnitActiveModel,
    Column as UnitColumn,
};
