use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};

use super::{KeyValueStore, StoreError};
use crate::datetime::{self, STORED_DATE_FORMAT};
use crate::models::{ProspectRecord, ProspectStatus};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn prospect_key(id: &str) -> String {
    format!("prospect:{id}")
}

/// Writes every field, overwriting whatever the hash held before. Concurrent
/// writers to the same id are not coordinated; the last write wins.
pub async fn save_prospect(
    store: &dyn KeyValueStore,
    record: &ProspectRecord,
) -> Result<(), StoreError> {
    let fields = to_fields(record).map_err(|e| StoreError::Backend(e.into()))?;
    store.hset(&prospect_key(&record.id), &fields).await?;
    tracing::debug!(prospect = %record.id, "saved prospect");
    Ok(())
}

/// `Ok(None)` when nothing is stored under the id, `Err(Corrupt)` when a
/// stored field fails to coerce back to its type.
pub async fn get_prospect(
    store: &dyn KeyValueStore,
    id: &str,
) -> Result<Option<ProspectRecord>, StoreError> {
    let data = store.hgetall(&prospect_key(id)).await?;
    if data.is_empty() {
        return Ok(None);
    }

    from_fields(id, &data)
        .map(Some)
        .map_err(|reason| StoreError::Corrupt {
            id: id.to_string(),
            reason,
        })
}

fn opt(value: &Option<String>) -> String {
    match value.as_deref() {
        None | Some("null") => String::new(),
        Some(v) => v.to_string(),
    }
}

fn to_fields(record: &ProspectRecord) -> Result<Vec<(String, String)>, serde_json::Error> {
    let pairs = [
        ("id", record.id.clone()),
        ("first_name", opt(&record.first_name)),
        ("last_name", opt(&record.last_name)),
        ("phone", record.phone.clone()),
        ("timezone", opt(&record.timezone)),
        ("status", record.status.as_str().to_string()),
        ("objections", serde_json::to_string(&record.objections)?),
        ("responses", serde_json::to_string(&record.responses)?),
        (
            "appointment_date",
            record
                .appointment_date
                .map(datetime::format_date)
                .unwrap_or_default(),
        ),
        ("appointment_time", opt(&record.appointment_time)),
        ("email", opt(&record.email)),
        ("address", opt(&record.address)),
        ("whatsapp_phone", opt(&record.whatsapp_phone)),
        ("created_at", record.created_at.format(TIMESTAMP_FORMAT).to_string()),
        ("updated_at", record.updated_at.format(TIMESTAMP_FORMAT).to_string()),
    ];

    Ok(pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect())
}

fn from_fields(id: &str, data: &HashMap<String, String>) -> Result<ProspectRecord, String> {
    let text = |key: &str| {
        data.get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "null")
            .map(str::to_string)
    };

    let list = |key: &str| -> Result<Vec<String>, String> {
        match text(key) {
            None => Ok(vec![]),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| format!("{key}: {e}")),
        }
    };

    // Older writers left timestamps out entirely.
    let now = Utc::now().naive_utc();
    let timestamp = |key: &str| -> Result<NaiveDateTime, String> {
        match text(key) {
            None => Ok(now),
            Some(raw) => NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
                .map_err(|e| format!("{key}: {e}")),
        }
    };

    let status = match text("status") {
        None => ProspectStatus::New,
        Some(raw) => {
            ProspectStatus::parse(&raw).ok_or_else(|| format!("status: unknown value '{raw}'"))?
        }
    };

    // Written as DD/MM/YYYY, but some agents stored ISO dates or timestamps.
    let appointment_date = text("appointment_date")
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, STORED_DATE_FORMAT)
                .ok()
                .or_else(|| datetime::parse_date(&raw))
                .ok_or_else(|| format!("appointment_date: '{raw}'"))
        })
        .transpose()?;

    let appointment_time = text("appointment_time")
        .map(|raw| {
            datetime::parse_time(&raw).ok_or_else(|| format!("appointment_time: '{raw}'"))
        })
        .transpose()?;

    Ok(ProspectRecord {
        id: id.to_string(),
        first_name: text("first_name"),
        last_name: text("last_name"),
        phone: data.get("phone").cloned().unwrap_or_default(),
        timezone: text("timezone"),
        status,
        objections: list("objections")?,
        responses: list("responses")?,
        appointment_date,
        appointment_time,
        email: text("email"),
        address: text("address"),
        whatsapp_phone: text("whatsapp_phone"),
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    fn full_record() -> ProspectRecord {
        ProspectRecord {
            id: "f2a45c3c-22f9-4d2f-9a87-b9f7a07b9e8c".to_string(),
            first_name: Some("Asha".to_string()),
            last_name: Some("Rao".to_string()),
            phone: "+919800000000".to_string(),
            timezone: Some("Asia/Kolkata".to_string()),
            status: ProspectStatus::InProgress,
            objections: vec!["too expensive".to_string(), "busy".to_string()],
            responses: vec!["20% off this month".to_string()],
            appointment_date: NaiveDate::from_ymd_opt(2025, 10, 20),
            appointment_time: Some("14:30".to_string()),
            email: Some("asha@example.com".to_string()),
            address: Some("Civil Lines, Nagpur".to_string()),
            whatsapp_phone: Some("+919811111111".to_string()),
            created_at: ts("2025-10-15 09:00:00.123456"),
            updated_at: ts("2025-10-15 09:05:00"),
        }
    }

    fn empty_record() -> ProspectRecord {
        ProspectRecord {
            id: "empty-1".to_string(),
            first_name: None,
            last_name: None,
            phone: String::new(),
            timezone: None,
            status: ProspectStatus::New,
            objections: vec![],
            responses: vec![],
            appointment_date: None,
            appointment_time: None,
            email: None,
            address: None,
            whatsapp_phone: None,
            created_at: ts("2025-10-15 09:00:00"),
            updated_at: ts("2025-10-15 09:00:00"),
        }
    }

    #[tokio::test]
    async fn test_round_trip_fully_populated() {
        let store = MemoryStore::new();
        let record = full_record();
        save_prospect(&store, &record).await.unwrap();

        let loaded = get_prospect(&store, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_round_trip_all_optional_absent() {
        let store = MemoryStore::new();
        let record = empty_record();
        save_prospect(&store, &record).await.unwrap();

        let loaded = get_prospect(&store, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_storage_layout() {
        let store = MemoryStore::new();
        save_prospect(&store, &full_record()).await.unwrap();

        let hash = store
            .hgetall("prospect:f2a45c3c-22f9-4d2f-9a87-b9f7a07b9e8c")
            .await
            .unwrap();
        assert_eq!(hash["appointment_date"], "20/10/2025");
        assert_eq!(hash["appointment_time"], "14:30");
        assert_eq!(hash["objections"], r#"["too expensive","busy"]"#);
        assert_eq!(hash["status"], "in_progress");

        save_prospect(&store, &empty_record()).await.unwrap();
        let hash = store.hgetall("prospect:empty-1").await.unwrap();
        assert_eq!(hash["email"], "");
        assert_eq!(hash["appointment_date"], "");
        assert_eq!(hash["objections"], "[]");
    }

    #[tokio::test]
    async fn test_null_sentinel_written_as_empty() {
        let store = MemoryStore::new();
        let mut record = empty_record();
        record.email = Some("null".to_string());
        save_prospect(&store, &record).await.unwrap();

        let hash = store.hgetall("prospect:empty-1").await.unwrap();
        assert_eq!(hash["email"], "");
    }

    #[tokio::test]
    async fn test_missing_record_is_absent() {
        let store = MemoryStore::new();
        assert!(get_prospect(&store, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_distinct_from_absent() {
        let store = MemoryStore::new();
        save_prospect(&store, &full_record()).await.unwrap();
        store
            .hset(
                "prospect:f2a45c3c-22f9-4d2f-9a87-b9f7a07b9e8c",
                &[("objections".to_string(), "not-json".to_string())],
            )
            .await
            .unwrap();

        let err = get_prospect(&store, "f2a45c3c-22f9-4d2f-9a87-b9f7a07b9e8c")
            .await
            .unwrap_err();
        match err {
            StoreError::Corrupt { reason, .. } => assert!(reason.starts_with("objections")),
            other => panic!("expected corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_date_is_corrupt() {
        let store = MemoryStore::new();
        save_prospect(&store, &empty_record()).await.unwrap();
        store
            .hset(
                "prospect:empty-1",
                &[("appointment_date".to_string(), "2025-13-45".to_string())],
            )
            .await
            .unwrap();

        assert!(matches!(
            get_prospect(&store, "empty-1").await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_iso_dates_written_by_other_agents() {
        let store = MemoryStore::new();
        for (id, raw) in [("iso-ts", "2025-10-20T00:00:00"), ("iso-date", "2025-10-20")] {
            store
                .hset(
                    &prospect_key(id),
                    &[
                        ("first_name".to_string(), "Asha".to_string()),
                        ("appointment_date".to_string(), raw.to_string()),
                        ("created_at".to_string(), "2025-10-15T09:00:00".to_string()),
                        ("updated_at".to_string(), "2025-10-15T09:00:00".to_string()),
                    ],
                )
                .await
                .unwrap();

            let record = get_prospect(&store, id).await.unwrap().unwrap();
            assert_eq!(record.appointment_date, NaiveDate::from_ymd_opt(2025, 10, 20));
            assert_eq!(record.first_name.as_deref(), Some("Asha"));
        }
    }

    #[tokio::test]
    async fn test_missing_timestamps_default_to_now() {
        let store = MemoryStore::new();
        store
            .hset(
                &prospect_key("legacy-1"),
                &[
                    ("first_name".to_string(), "Rohan".to_string()),
                    ("phone".to_string(), "+919811111111".to_string()),
                ],
            )
            .await
            .unwrap();

        let before = Utc::now().naive_utc();
        let record = get_prospect(&store, "legacy-1").await.unwrap().unwrap();
        assert_eq!(record.first_name.as_deref(), Some("Rohan"));
        assert_eq!(record.phone, "+919811111111");
        assert_eq!(record.status, ProspectStatus::New);
        assert!(record.created_at >= before);
        assert!(record.updated_at >= before);
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_corrupt() {
        let store = MemoryStore::new();
        save_prospect(&store, &empty_record()).await.unwrap();
        store
            .hset(
                "prospect:empty-1",
                &[("created_at".to_string(), "last tuesday".to_string())],
            )
            .await
            .unwrap();

        assert!(matches!(
            get_prospect(&store, "empty-1").await,
            Err(StoreError::Corrupt { reason, .. }) if reason.starts_with("created_at")
        ));
    }
}
