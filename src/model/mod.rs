//! Value types shared by the service clients and the view-state containers.

mod chat;
mod recipe;
mod user;

pub use chat::{ChatTurn, Transcript};
pub use recipe::{
    Equipment, Ingredient, Instruction, Measure, Measures, Nutrient, Nutrition, ProductMatch,
    Recipe, RecipePage, Step, WinePairing,
};
pub use user::{ProfileUpdate, User};
