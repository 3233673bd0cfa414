use std::cmp::Ordering;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::debug;

use super::{BookMap, ValidationError};
use crate::timezone::{to_display, DISPLAY_TZ};

/// Books split by publication day relative to a reference day.
#[derive(Debug, Default)]
pub struct Partition {
    pub past: BookMap,
    pub current: BookMap,
    pub future: BookMap,
}

/// Buckets books by comparing their display-timezone publication date with
/// the reference date. The reference must already be in the display
/// timezone; books without a publication date are dropped.
pub fn classify(books: &BookMap, reference: &DateTime<Tz>) -> Result<Partition, ValidationError> {
    if reference.timezone() != DISPLAY_TZ {
        return Err(ValidationError::WrongTimezone {
            found: reference.timezone().name().to_string(),
        });
    }

    let today = reference.date_naive();
    let mut partition = Partition::default();

    for (key, book) in books {
        let Some(published) = book.published else {
            debug!("Skipping {key}: no publication date");
            continue;
        };
        let bucket = match to_display(&published).date_naive().cmp(&today) {
            Ordering::Less => &mut partition.past,
            Ordering::Equal => &mut partition.current,
            Ordering::Greater => &mut partition.future,
        };
        bucket.insert(key.clone(), book.clone());
    }

    Ok(partition)
}
