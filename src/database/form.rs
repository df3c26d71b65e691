use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::error::{Error, TypeError};

pub type FormData = HashMap<String, Value>;

/// Loosely-typed form payload, as submitted by the HTTP layer. Typed access
/// goes through the getters; enums implement `TryFrom<Value>` for
/// `get_value`.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| TypeError::new("Invalid type conversion").into()),
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => v
                    .parse()
                    .map_err(|_e| TypeError::new("Invalid type conversion").into()),
                None => Err(TypeError::new("Failed to parse value as str").into()),
            },
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Invalid key")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    /// Array-valued field, e.g. the tag id list of a recipe form.
    pub fn get_list(&self, key: &str) -> Result<Vec<Value>, TypeError> {
        match self.inner.get(key) {
            Some(Value::Array(values)) => Ok(values.to_owned()),
            Some(_) => Err(TypeError::new("Failed to parse value as array")),
            None => Err(TypeError::new("Invalid key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::MembershipKind;

    fn form() -> Form {
        let mut data = FormData::new();
        data.insert(String::from("name"), json!("Pancakes"));
        data.insert(String::from("cooking_time"), json!("25"));
        data.insert(String::from("kind"), json!("favorite"));
        data.insert(String::from("tags"), json!([1, 2, 3]));
        Form::from_data(data)
    }

    #[test]
    fn typed_getters() {
        let form = form();
        assert_eq!(form.get_str("name").unwrap(), "Pancakes");
        assert_eq!(form.get_number::<i32>("cooking_time").unwrap(), 25);
        assert_eq!(
            form.get_value::<MembershipKind>("kind").unwrap(),
            MembershipKind::Favorite
        );
        assert_eq!(form.get_list("tags").unwrap().len(), 3);
    }

    #[test]
    fn missing_and_mistyped_keys_fail() {
        let form = form();
        assert!(form.get_str("missing").is_err());
        assert!(form.get_number::<i32>("name").is_err());
        assert!(form.get_list("name").is_err());
    }
}
