use crate::utils::error::{Result, RouterError};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// 檢查輸出格式是否都在允許清單內
pub fn validate_formats(field_name: &str, formats: &[String], allowed: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed.iter().copied().collect();

    if formats.is_empty() {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "At least one output format is required".to_string(),
        });
    }

    for format in formats {
        if !allowed_set.contains(format.as_str()) {
            return Err(RouterError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    allowed.join(", ")
                ),
            });
        }
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| RouterError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(RouterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
