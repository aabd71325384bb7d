use serde::de::{DeserializeOwned, Error, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::assignment::Level;

/// Query string of `GET /assignments`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub pages: Option<u64>,
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub level: Option<Level>,
}

/// Query string of `GET /count`.
#[derive(Debug, Default, Deserialize)]
pub struct CountQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub level: Option<Level>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub total_items: u64,
}

/// Forms send `level=` when nothing is selected; that means no filter.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => T::deserialize(raw.into_deserializer())
            .map(Some)
            .map_err(|e: serde::de::value::Error| D::Error::custom(e)),
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use axum::http::Uri;

    use super::*;

    fn list(uri: &'static str) -> Option<ListQuery> {
        Query::<ListQuery>::try_from_uri(&Uri::from_static(uri))
            .ok()
            .map(|Query(q)| q)
    }

    #[test]
    fn empty_level_is_no_filter() {
        let query = list("/assignments?pages=0&size=6&level=").unwrap();
        assert_eq!(query.level, None);
        assert_eq!(query.size, Some(6));

        let Query(count) = Query::<CountQuery>::try_from_uri(&Uri::from_static("/count?level="))
            .unwrap();
        assert_eq!(count.level, None);
    }

    #[test]
    fn level_is_parsed_or_rejected() {
        assert_eq!(list("/assignments?level=hard").unwrap().level, Some(Level::Hard));
        assert_eq!(list("/assignments").unwrap().level, None);
        assert!(list("/assignments?level=impossible").is_none());
    }
}
