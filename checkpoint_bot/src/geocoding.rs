use std::{future::Future, time::Duration};

use serde_json::Value;

use crate::reports::Location;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoder returned something weird: {0}")]
    Malformed(String),
}

/// Something that can turn an address into a `(latitude, longitude)` pair.
pub trait Geocoder {
    /// Returns `Ok(None)` if the address just couldn't be found.
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<(f64, f64)>, GeocodeError>> + Send;
}

/// [`None`] is a geocoder that never finds anything.
impl<G: Geocoder + Sync> Geocoder for Option<G> {
    async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>, GeocodeError> {
        match self {
            Some(geocoder) => geocoder.geocode(address).await,
            None => Ok(None),
        }
    }
}

/// [Yandex Geocoder](https://yandex.ru/dev/geocode/) HTTP API client.
pub struct YandexGeocoder {
    client: reqwest::Client,
    api_key: String,
}

impl YandexGeocoder {
    const ENDPOINT: &'static str = "https://geocode-maps.yandex.ru/1.x/";

    pub fn new(api_key: String) -> Result<YandexGeocoder, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(YandexGeocoder { client, api_key })
    }
}

impl Geocoder for YandexGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>, GeocodeError> {
        let response: Value = self
            .client
            .get(Self::ENDPOINT)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("geocode", address),
                ("format", "json"),
                ("results", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_yandex_response(&response)
    }
}

/// Pull the coordinates of the first result out of a Yandex Geocoder response.
fn parse_yandex_response(response: &Value) -> Result<Option<(f64, f64)>, GeocodeError> {
    let Some(members) = response
        .pointer("/response/GeoObjectCollection/featureMember")
        .and_then(Value::as_array)
    else {
        return Err(GeocodeError::Malformed("no featureMember list".to_string()));
    };

    let Some(first) = members.first() else {
        return Ok(None);
    };

    let pos = first
        .pointer("/GeoObject/Point/pos")
        .and_then(Value::as_str)
        .ok_or_else(|| GeocodeError::Malformed("no Point.pos".to_string()))?;

    // Yandex puts longitude first.
    let mut numbers = pos.split_whitespace().map(str::parse::<f64>);
    match (numbers.next(), numbers.next(), numbers.next()) {
        (Some(Ok(longitude)), Some(Ok(latitude)), None) => Ok(Some((latitude, longitude))),
        _ => Err(GeocodeError::Malformed(format!("bad Point.pos: {pos:?}"))),
    }
}

/// Turn free text into a [`Location`], geocoding it if possible.
///
/// If the geocoder can't find it or fails, the text is kept as an address as is.
pub async fn resolve_location(geocoder: &impl Geocoder, text: &str) -> Location {
    let text = text.trim();

    match geocoder.geocode(text).await {
        Ok(Some((latitude, longitude))) => {
            let location = Location::coordinates(latitude, longitude);
            if location.is_valid() {
                log::debug!("Geocoded {:?} to {}", text, location);
                return location;
            }
            log::warn!("Geocoder gave nonsense for {:?}: {}", text, location);
        }
        Ok(None) => log::debug!("Geocoder found nothing for {:?}", text),
        Err(e) => log::warn!("Failed to geocode {:?}: {}", text, e),
    }

    Location::address(text)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    struct Fake(Option<(f64, f64)>);

    impl Geocoder for Fake {
        async fn geocode(&self, _address: &str) -> Result<Option<(f64, f64)>, GeocodeError> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl Geocoder for Broken {
        async fn geocode(&self, _address: &str) -> Result<Option<(f64, f64)>, GeocodeError> {
            Err(GeocodeError::Malformed("nope".to_string()))
        }
    }

    #[test]
    fn yandex_response() {
        let response = json!({
            "response": {
                "GeoObjectCollection": {
                    "metaDataProperty": {},
                    "featureMember": [
                        {
                            "GeoObject": {
                                "name": "Tverskaya ulitsa, 1",
                                "Point": { "pos": "37.611347 55.757743" }
                            }
                        }
                    ]
                }
            }
        });

        assert_eq!(
            parse_yandex_response(&response).unwrap(),
            Some((55.757743, 37.611347))
        );
    }

    #[test]
    fn yandex_found_nothing() {
        let response = json!({
            "response": { "GeoObjectCollection": { "featureMember": [] } }
        });
        assert_eq!(parse_yandex_response(&response).unwrap(), None);
    }

    #[test]
    fn yandex_garbage() {
        assert!(parse_yandex_response(&json!({"statusCode": 403})).is_err());

        let response = json!({
            "response": { "GeoObjectCollection": { "featureMember": [
                { "GeoObject": { "Point": { "pos": "37.6" } } }
            ] } }
        });
        assert!(parse_yandex_response(&response).is_err());
    }

    #[tokio::test]
    async fn resolves_to_coordinates() {
        let location = resolve_location(&Fake(Some((55.75, 37.61))), " Tverskaya 1 ").await;
        assert_eq!(location, Location::coordinates(55.75, 37.61));
    }

    #[tokio::test]
    async fn unresolved_text_is_kept() {
        let location = resolve_location(&Fake(None), " Tverskaya 1 ").await;
        assert_eq!(location, Location::address("Tverskaya 1"));

        let location = resolve_location(&Broken, "Tverskaya 1").await;
        assert_eq!(location, Location::address("Tverskaya 1"));

        let location = resolve_location(&None::<Broken>, "Tverskaya 1").await;
        assert_eq!(location, Location::address("Tverskaya 1"));

        let location = resolve_location(&Fake(Some((100.0, 37.61))), "Tverskaya 1").await;
        assert_eq!(location, Location::address("Tverskaya 1"));
    }
}
