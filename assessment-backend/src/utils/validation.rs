use crate::error::{Error, Result};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

pub fn validate<T: Validate>(val: &T) -> Result<()> {
    val.validate()?;
    Ok(())
}

/// Rejects batches that name the same id twice.
pub fn ensure_unique_ids<I>(ids: I, what: &str) -> Result<()>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::BadRequest(format!("duplicate {} {}", what, id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected() {
        let id = Uuid::new_v4();
        let err = ensure_unique_ids([id, Uuid::new_v4(), id], "question").unwrap_err();
        assert!(err.to_string().contains("duplicate question"));
        assert!(ensure_unique_ids([Uuid::new_v4(), Uuid::new_v4()], "question").is_ok());
    }
}
