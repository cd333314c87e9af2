//! Runtime validation and copy-on-write builders for v1 menu documents.

use serde_json::{Map, Value};

use crate::error::{SchemaErrors, SchemaViolation};
use crate::models::{MenuCategory, MenuDocument, MenuItem, MENU_SCHEMA_VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidation {
    pub valid: bool,
    pub errors: Vec<SchemaViolation>,
}

/// Check raw JSON against the v1 schema, collecting every violation.
pub fn validate_menu_data(data: &Value) -> SchemaValidation {
    let Some(menu) = data.as_object() else {
        return SchemaValidation {
            valid: false,
            errors: vec![violation("", "Data must be an object")],
        };
    };

    let mut errors = Vec::new();

    if !is_supported_version(menu.get("schema_version")) {
        errors.push(violation(
            "schema_version",
            format!("schema_version must be {}", MENU_SCHEMA_VERSION),
        ));
    }

    match menu.get("categories").and_then(Value::as_array) {
        None => errors.push(violation("categories", "categories must be an array")),
        Some(categories) => {
            for (cat_index, category) in categories.iter().enumerate() {
                check_category(cat_index, category, &mut errors);
            }
        }
    }

    SchemaValidation {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_category(cat_index: usize, category: &Value, errors: &mut Vec<SchemaViolation>) {
    let path = format!("categories[{}]", cat_index);
    let Some(category) = category.as_object() else {
        errors.push(violation(path, "Category must be an object"));
        return;
    };

    if !is_non_empty_string(category, "name") {
        errors.push(violation(
            format!("{}.name", path),
            "Category name is required and must be non-empty",
        ));
    }

    let Some(items) = category.get("items").and_then(Value::as_array) else {
        errors.push(violation(
            format!("{}.items", path),
            "Category items must be an array",
        ));
        return;
    };

    for (item_index, item) in items.iter().enumerate() {
        let item_path = format!("{}.items[{}]", path, item_index);
        let Some(item) = item.as_object() else {
            errors.push(violation(item_path, "Item must be an object"));
            continue;
        };

        if !is_non_empty_string(item, "name") {
            errors.push(violation(
                format!("{}.name", item_path),
                "Item name is required and must be non-empty",
            ));
        }

        match item.get("price") {
            None | Some(Value::Null) | Some(Value::Number(_)) | Some(Value::String(_)) => {}
            Some(_) => errors.push(violation(
                format!("{}.price", item_path),
                "Price must be number, string, or null",
            )),
        }
    }
}

// 1 and 1.0 are the same JSON number.
fn is_supported_version(version: Option<&Value>) -> bool {
    version
        .and_then(Value::as_f64)
        .is_some_and(|v| v == f64::from(MENU_SCHEMA_VERSION))
}

fn is_non_empty_string(object: &Map<String, Value>, key: &str) -> bool {
    object
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

fn violation(path: impl Into<String>, message: impl Into<String>) -> SchemaViolation {
    SchemaViolation {
        path: path.into(),
        message: message.into(),
    }
}

impl MenuDocument {
    /// Parse raw JSON, rejecting the whole document if any rule is broken.
    pub fn from_value(data: Value) -> Result<Self, SchemaErrors> {
        let validation = validate_menu_data(&data);
        if !validation.valid {
            return Err(SchemaErrors(validation.errors));
        }

        serde_json::from_value(data).map_err(|e| {
            SchemaErrors(vec![violation("", format!("Malformed menu document: {}", e))])
        })
    }

    /// Validate this document as it would be sent on the wire.
    pub fn validate(&self) -> SchemaValidation {
        match serde_json::to_value(self) {
            Ok(value) => validate_menu_data(&value),
            Err(e) => SchemaValidation {
                valid: false,
                errors: vec![violation("", e.to_string())],
            },
        }
    }
}

/// An empty document that passes validation.
pub fn create_empty_menu_data(title: Option<&str>) -> MenuDocument {
    MenuDocument {
        schema_version: MENU_SCHEMA_VERSION,
        title: Some(title.unwrap_or_default().to_string()),
        categories: Vec::new(),
        theme: None,
    }
}

/// New document with an empty category appended; `menu` is left as is.
pub fn add_category(menu: &MenuDocument, category_name: &str) -> MenuDocument {
    let mut next = menu.clone();
    next.categories.push(MenuCategory {
        name: category_name.to_string(),
        items: Vec::new(),
    });
    next
}

/// New document with `item` appended to the category at `category_index`.
///
/// An index past the end returns an unchanged copy rather than an error.
pub fn add_item_to_category(menu: &MenuDocument, category_index: usize, item: MenuItem) -> MenuDocument {
    let mut next = menu.clone();
    if let Some(category) = next.categories.get_mut(category_index) {
        category.items.push(item);
    } else {
        tracing::debug!(
            category_index,
            categories = menu.categories.len(),
            "Ignoring item for missing category"
        );
    }
    next
}
