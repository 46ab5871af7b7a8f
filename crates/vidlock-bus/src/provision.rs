//! Idempotent stream provisioning.
//!
//! The stream must carry every subject pattern the processor uses. A missing
//! stream is created; an existing one is only ever extended with the subjects
//! it lacks. Nothing is removed, and a correctly configured stream sees no
//! mutating call at all.

use async_nats::jetstream::{self, context::GetStreamErrorKind, stream, ErrorCode};
use async_trait::async_trait;

use vidlock_core::{Error, Result};

/// Administrative operations provisioning needs.
#[async_trait]
pub trait StreamAdmin: Send + Sync {
    /// Subjects of stream `name`, or `None` when it does not exist.
    async fn stream_subjects(&self, name: &str) -> Result<Option<Vec<String>>>;

    async fn create_stream(&self, name: &str, subjects: &[String]) -> Result<()>;

    /// Replace the subject list of an existing stream, keeping its other settings.
    async fn update_subjects(&self, name: &str, subjects: &[String]) -> Result<()>;
}

/// What [`ensure_stream`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    Extended { added: Vec<String> },
    Unchanged,
}

/// Make sure stream `name` exists and covers `required`.
///
/// Safe to run concurrently from several processes: losing a creation race
/// falls through to the extend path.
pub async fn ensure_stream<A: StreamAdmin + ?Sized>(
    admin: &A,
    name: &str,
    required: &[&str],
) -> Result<ProvisionOutcome> {
    let required: Vec<String> = required.iter().map(|s| s.to_string()).collect();

    for attempt in 0..2 {
        match admin.stream_subjects(name).await? {
            None => match admin.create_stream(name, &required).await {
                Ok(()) => {
                    tracing::info!(stream = name, subjects = ?required, "Stream created");
                    return Ok(ProvisionOutcome::Created);
                }
                Err(e) if attempt == 0 => {
                    tracing::debug!(stream = name, error = %e, "Stream create failed; re-checking");
                }
                Err(e) => return Err(e),
            },
            Some(existing) => {
                let added: Vec<String> = required
                    .iter()
                    .filter(|s| !existing.contains(s))
                    .cloned()
                    .collect();
                if added.is_empty() {
                    tracing::debug!(stream = name, "Stream already provisioned");
                    return Ok(ProvisionOutcome::Unchanged);
                }

                let mut subjects = existing;
                subjects.extend(added.iter().cloned());
                admin.update_subjects(name, &subjects).await?;
                tracing::info!(stream = name, added = ?added, "Stream subjects extended");
                return Ok(ProvisionOutcome::Extended { added });
            }
        }
    }

    Err(Error::transport(format!("stream {name} could not be provisioned")))
}

/// [`StreamAdmin`] over a JetStream context. New streams use file storage.
pub struct JetStreamAdmin {
    context: jetstream::Context,
}

impl JetStreamAdmin {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StreamAdmin for JetStreamAdmin {
    async fn stream_subjects(&self, name: &str) -> Result<Option<Vec<String>>> {
        match self.context.get_stream(name).await {
            Ok(stream) => Ok(Some(stream.cached_info().config.subjects.clone())),
            Err(e) => match e.kind() {
                GetStreamErrorKind::JetStream(js) if js.error_code() == ErrorCode::STREAM_NOT_FOUND => {
                    Ok(None)
                }
                _ => Err(Error::transport(format!("failed to look up stream {name}: {e}"))),
            },
        }
    }

    async fn create_stream(&self, name: &str, subjects: &[String]) -> Result<()> {
        self.context
            .create_stream(stream::Config {
                name: name.to_string(),
                subjects: subjects.to_vec(),
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::transport(format!("failed to create stream {name}: {e}")))?;
        Ok(())
    }

    async fn update_subjects(&self, name: &str, subjects: &[String]) -> Result<()> {
        let stream = self
            .context
            .get_stream(name)
            .await
            .map_err(|e| Error::transport(format!("failed to look up stream {name}: {e}")))?;
        let mut config = stream.cached_info().config.clone();
        config.subjects = subjects.to_vec();
        self.context
            .update_stream(&config)
            .await
            .map_err(|e| Error::transport(format!("failed to update stream {name}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vidlock_core::events::REQUIRED_SUBJECTS;

    #[derive(Default)]
    struct FakeAdmin {
        subjects: Mutex<Option<Vec<String>>>,
        creates: AtomicUsize,
        updates: AtomicUsize,
        /// Simulate another process creating the stream first.
        lose_race: bool,
    }

    impl FakeAdmin {
        fn with_subjects(subjects: &[&str]) -> Self {
            Self {
                subjects: Mutex::new(Some(subjects.iter().map(|s| s.to_string()).collect())),
                ..Default::default()
            }
        }

        fn mutations(&self) -> usize {
            self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamAdmin for FakeAdmin {
        async fn stream_subjects(&self, _name: &str) -> Result<Option<Vec<String>>> {
            Ok(self.subjects.lock().clone())
        }

        async fn create_stream(&self, _name: &str, subjects: &[String]) -> Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let mut current = self.subjects.lock();
            if self.lose_race && current.is_none() {
                *current = Some(vec!["video.uploads.*".to_string()]);
                return Err(Error::transport("stream name already in use"));
            }
            *current = Some(subjects.to_vec());
            Ok(())
        }

        async fn update_subjects(&self, _name: &str, subjects: &[String]) -> Result<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.subjects.lock() = Some(subjects.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn creates_missing_stream() {
        let admin = FakeAdmin::default();
        let outcome = ensure_stream(&admin, "VIDEO_UPLOADS", &REQUIRED_SUBJECTS).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::Created);
        assert_eq!(admin.subjects.lock().as_ref().unwrap().len(), REQUIRED_SUBJECTS.len());
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let admin = FakeAdmin::default();
        ensure_stream(&admin, "VIDEO_UPLOADS", &REQUIRED_SUBJECTS).await.unwrap();
        let before = admin.mutations();

        let outcome = ensure_stream(&admin, "VIDEO_UPLOADS", &REQUIRED_SUBJECTS).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::Unchanged);
        assert_eq!(admin.mutations(), before);
    }

    #[tokio::test]
    async fn extends_without_removing() {
        let admin = FakeAdmin::with_subjects(&["video.uploads.*", "legacy.>"]);
        let outcome = ensure_stream(&admin, "VIDEO_UPLOADS", &REQUIRED_SUBJECTS).await.unwrap();

        let ProvisionOutcome::Extended { added } = outcome else {
            panic!("expected extension, got {outcome:?}");
        };
        assert_eq!(added.len(), REQUIRED_SUBJECTS.len() - 1);
        assert!(!added.contains(&"video.uploads.*".to_string()));

        let subjects = admin.subjects.lock().clone().unwrap();
        assert!(subjects.contains(&"legacy.>".to_string()));
        assert_eq!(subjects[0], "video.uploads.*");
        assert_eq!(admin.creates.load(Ordering::SeqCst), 0);
        assert_eq!(admin.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lost_create_race_falls_back_to_extend() {
        let admin = FakeAdmin {
            lose_race: true,
            ..Default::default()
        };
        let outcome = ensure_stream(&admin, "VIDEO_UPLOADS", &REQUIRED_SUBJECTS).await.unwrap();
        assert!(matches!(outcome, ProvisionOutcome::Extended { .. }));
        let subjects = admin.subjects.lock().clone().unwrap();
        for required in REQUIRED_SUBJECTS {
            assert!(subjects.contains(&required.to_string()));
        }
    }
}
