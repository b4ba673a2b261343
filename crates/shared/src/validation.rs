//! Common validation utilities.

use validator::ValidationError;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a GPS accuracy radius is non-negative.
pub fn validate_accuracy(accuracy: f64) -> Result<(), ValidationError> {
    if accuracy >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("accuracy_range");
        err.message = Some("Accuracy must be non-negative".into());
        Err(err)
    }
}

/// Validates that battery level is within valid range (0 to 100).
pub fn validate_battery_level(level: u8) -> Result<(), ValidationError> {
    if level <= 100 {
        Ok(())
    } else {
        let mut err = ValidationError::new("battery_range");
        err.message = Some("Battery level must be between 0 and 100".into());
        Err(err)
    }
}

/// Validates that a zone radius is positive.
pub fn validate_radius_meters(radius: f64) -> Result<(), ValidationError> {
    if radius > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be greater than 0 meters".into());
        Err(err)
    }
}

/// Validates that an hour-of-day is within 0..=23.
pub fn validate_hour(hour: u8) -> Result<(), ValidationError> {
    if hour <= 23 {
        Ok(())
    } else {
        let mut err = ValidationError::new("hour_range");
        err.message = Some("Hour must be between 0 and 23".into());
        Err(err)
    }
}

/// Validates that a weekday index is within 0..=6 (Sunday = 0).
pub fn validate_weekday(day: u8) -> Result<(), ValidationError> {
    if day <= 6 {
        Ok(())
    } else {
        let mut err = ValidationError::new("weekday_range");
        err.message = Some("Weekday must be between 0 and 6".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    #[test]
    fn test_validate_latitude() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.1).is_err());
        assert!(validate_latitude(-90.1).is_err());
    }

    #[test]
    fn test_validate_latitude_error_message() {
        let err = validate_latitude(100.0).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Latitude must be between -90 and 90"
        );
    }

    #[test]
    fn test_validate_longitude() {
        assert!(validate_longitude(0.0).is_ok());
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.1).is_err());
        assert!(validate_longitude(-180.1).is_err());
    }

    #[test]
    fn test_validate_accuracy() {
        assert!(validate_accuracy(0.0).is_ok());
        assert!(validate_accuracy(12.5).is_ok());
        assert!(validate_accuracy(-1.0).is_err());
    }

    #[test]
    fn test_validate_battery_level() {
        assert!(validate_battery_level(0).is_ok());
        assert!(validate_battery_level(100).is_ok());
        assert!(validate_battery_level(101).is_err());
    }

    #[test]
    fn test_validate_radius_meters() {
        assert!(validate_radius_meters(20.0).is_ok());
        assert!(validate_radius_meters(0.0).is_err());
        assert!(validate_radius_meters(-50.0).is_err());
    }

    #[test]
    fn test_validate_hour() {
        assert!(validate_hour(0).is_ok());
        assert!(validate_hour(23).is_ok());
        assert!(validate_hour(24).is_err());
    }

    #[test]
    fn test_validate_weekday() {
        for day in 0..=6u8 {
            assert!(validate_weekday(day).is_ok());
        }
        assert!(validate_weekday(7).is_err());
    }

    #[test]
    fn test_validate_random_in_range_values() {
        for _ in 0..32 {
            let lat: f64 = (-90.0..90.0).fake();
            let lon: f64 = (-180.0..180.0).fake();
            assert!(validate_latitude(lat).is_ok());
            assert!(validate_longitude(lon).is_ok());
        }
        let level: u8 = Faker.fake::<u8>() % 101;
        assert!(validate_battery_level(level).is_ok());
    }
}
