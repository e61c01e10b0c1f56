use std::{fmt, str::FromStr};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{IdentifyReply, ItemWithLoc};
use crate::storage::KeyValueStore;

/// Storage entry holding the API key between sessions.
pub const API_KEY_STORAGE_KEY: &str = "nutri_x_api_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    /// Label the backend uses as the plan key.
    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "早餐",
            MealSlot::Lunch => "午餐",
            MealSlot::Dinner => "晚餐",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown meal slot '{0}' (expected 早餐, 午餐 or 晚餐)")]
pub struct ParseMealSlotError(String);

impl FromStr for MealSlot {
    type Err = ParseMealSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "早餐" => Ok(MealSlot::Breakfast),
            "午餐" => Ok(MealSlot::Lunch),
            "晚餐" => Ok(MealSlot::Dinner),
            other => match other.to_ascii_lowercase().as_str() {
                "breakfast" => Ok(MealSlot::Breakfast),
                "lunch" => Ok(MealSlot::Lunch),
                "dinner" => Ok(MealSlot::Dinner),
                _ => Err(ParseMealSlotError(s.to_string())),
            },
        }
    }
}

/// Dishes picked for each meal of the day. Serialises as
/// `{"早餐": [...], "午餐": [...], "晚餐": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPlan {
    #[serde(rename = "早餐", default)]
    breakfast: Vec<String>,
    #[serde(rename = "午餐", default)]
    lunch: Vec<String>,
    #[serde(rename = "晚餐", default)]
    dinner: Vec<String>,
}

impl MealPlan {
    pub fn slot(&self, slot: MealSlot) -> &[String] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
        }
    }

    fn slot_mut(&mut self, slot: MealSlot) -> &mut Vec<String> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
        }
    }

    pub fn is_empty(&self) -> bool {
        MealSlot::ALL.iter().all(|s| self.slot(*s).is_empty())
    }
}

/// Client-side state for one session. Handed to the API client explicitly
/// so request building can read the current key.
pub struct SessionState {
    storage: Box<dyn KeyValueStore>,
    api_key: String,
    pub ingredients: Vec<String>,
    pub items_with_loc: Vec<ItemWithLoc>,
    pub nutrition_data: Vec<Value>,
    pub selected_ingredients: Vec<String>,
    pub recommendations: Vec<Value>,
    meal_plan: MealPlan,
}

impl SessionState {
    /// Create the state, restoring the API key from `storage`.
    pub fn new(storage: Box<dyn KeyValueStore>) -> Result<Self> {
        let api_key = storage.get(API_KEY_STORAGE_KEY)?.unwrap_or_default();
        Ok(SessionState {
            storage,
            api_key,
            ingredients: Vec::new(),
            items_with_loc: Vec::new(),
            nutrition_data: Vec::new(),
            selected_ingredients: Vec::new(),
            recommendations: Vec::new(),
            meal_plan: MealPlan::default(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Update the key in memory and write it through to storage.
    pub fn set_api_key(&mut self, key: impl Into<String>) -> Result<()> {
        self.api_key = key.into();
        self.storage.set(API_KEY_STORAGE_KEY, &self.api_key)
    }

    pub fn set_ingredients(&mut self, data: Vec<String>) {
        self.ingredients = data;
    }

    pub fn set_items_with_loc(&mut self, data: Vec<ItemWithLoc>) {
        self.items_with_loc = data;
    }

    pub fn set_nutrition_data(&mut self, data: Vec<Value>) {
        self.nutrition_data = data;
    }

    pub fn set_selected_ingredients(&mut self, data: Vec<String>) {
        self.selected_ingredients = data;
    }

    pub fn set_recommendations(&mut self, data: Vec<Value>) {
        self.recommendations = data;
    }

    /// Store the results of a successful identification.
    pub fn apply_identification(&mut self, reply: IdentifyReply) {
        self.set_ingredients(reply.ingredients);
        self.set_items_with_loc(reply.items_with_loc);
        self.set_nutrition_data(reply.nutrition);
    }

    pub fn meal_plan(&self) -> &MealPlan {
        &self.meal_plan
    }

    /// Append `dish` to `slot` unless it is already there.
    pub fn add_to_meal_plan(&mut self, slot: MealSlot, dish: impl Into<String>) {
        let dish = dish.into();
        let dishes = self.meal_plan.slot_mut(slot);
        if !dishes.contains(&dish) {
            dishes.push(dish);
        }
    }

    pub fn remove_from_meal_plan(&mut self, slot: MealSlot, dish: &str) {
        let dishes = self.meal_plan.slot_mut(slot);
        if let Some(index) = dishes.iter().position(|d| d == dish) {
            dishes.remove(index);
        }
    }
}
