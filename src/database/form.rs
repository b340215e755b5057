use std::str::FromStr;

use super::error::Error;

pub type FormData = Vec<(String, String)>;

/// Query string parameters, keeping repeated keys such as `tags=a&tags=b`.
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    /// Missing or empty values are `None`; anything unparsable is rejected.
    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.get_str(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| Error::validation(format!("{key} must be a number"))),
        }
    }

    pub fn get_flag(&self, key: &str) -> Result<bool, Error> {
        match self.get_str(key).map(str::trim) {
            None | Some("") => Ok(false),
            Some("1") | Some("true") | Some("True") => Ok(true),
            Some("0") | Some("false") | Some("False") => Ok(false),
            Some(_) => Err(Error::validation(format!("{key} must be a boolean"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_kept() {
        let form = form(&[("tags", "breakfast"), ("author", "1"), ("tags", "lunch")]);

        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_str("tags"), Some("breakfast"));
    }

    #[test]
    fn numbers_must_parse() {
        let form = form(&[("limit", "abc"), ("page", "2"), ("empty", "")]);

        assert!(matches!(
            form.get_number::<i64>("limit"),
            Err(Error::Validation(_))
        ));
        assert_eq!(form.get_number::<i64>("page").unwrap(), Some(2));
        assert_eq!(form.get_number::<i64>("empty").unwrap(), None);
        assert_eq!(form.get_number::<i64>("missing").unwrap(), None);
    }

    #[test]
    fn flags_accept_numeric_and_word_forms() {
        let form = form(&[("a", "1"), ("b", "false"), ("c", "maybe")]);

        assert!(form.get_flag("a").unwrap());
        assert!(!form.get_flag("b").unwrap());
        assert!(!form.get_flag("missing").unwrap());
        assert!(form.get_flag("c").is_err());
    }
}
