use std::{
    fs::{self, File},
    io::{BufWriter, Write as _},
    path::Path,
    sync::Arc,
};

use futures::{StreamExt as _, TryStreamExt as _};
use object_store::{ObjectStore, path::Path as ObjectPath};
use scopeguard::ScopeGuard;
use tokio::runtime::Runtime;

use crate::utils::{
    cancel::CancelFlag,
    downloader_def::r#trait::RemoteObject,
    errors::{ResultTrait, StorageError, StorageResult},
};

/// Blocking list/get over an `object_store` backend.
#[derive(Clone)]
pub struct CloudStore {
    backend: &'static str,
    store: Arc<dyn ObjectStore>,
}

impl CloudStore {
    pub fn new(backend: &'static str, store: Arc<dyn ObjectStore>) -> Self {
        Self { backend, store }
    }

    /// Lists everything below `prefix`. A prefix naming a single object (no
    /// children) yields that object alone.
    pub fn list(&self, rt: &Runtime, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        let location = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));

        rt.block_on(async {
            let mut objects: Vec<RemoteObject> = self
                .store
                .list(location.as_ref())
                .map_ok(|meta| RemoteObject::new(meta.location.to_string()))
                .try_collect()
                .await
                .backend_err(self.backend, &format!("list '{prefix}'"))?;

            if objects.is_empty()
                && let Some(location) = location.as_ref()
                && let Ok(meta) = self.store.head(location).await
            {
                objects.push(RemoteObject::new(meta.location.to_string()));
            }
            Ok::<_, StorageError>(objects)
        })
    }

    /// Lists every object whose key starts with `prefix` as a plain string,
    /// so `models/model` also matches `models/model.pkl` and
    /// `models/model-assets/a.bin`.
    pub fn list_by_key_prefix(
        &self,
        rt: &Runtime,
        prefix: &str,
    ) -> StorageResult<Vec<RemoteObject>> {
        let parent = prefix.rsplit_once('/').map_or("", |(parent, _)| parent);
        let objects = self.list(rt, parent)?;
        Ok(objects
            .into_iter()
            .filter(|o| o.key.starts_with(prefix))
            .collect())
    }

    pub fn fetch(
        &self,
        rt: &Runtime,
        key: &str,
        dest: &Path,
        cancel: &CancelFlag,
    ) -> StorageResult<()> {
        let location =
            ObjectPath::parse(key).backend_err(self.backend, &format!("invalid key '{key}'"))?;

        rt.block_on(async {
            let mut stream = self
                .store
                .get(&location)
                .await
                .backend_err(self.backend, &format!("get '{key}'"))?
                .into_stream();

            let file = File::create(dest)?;
            let cleanup = scopeguard::guard(dest.to_path_buf(), |partial| {
                let _ = fs::remove_file(partial);
            });
            let mut writer = BufWriter::new(file);
            while let Some(chunk) = stream.next().await {
                cancel.check(key)?;
                let chunk = chunk.backend_err(self.backend, &format!("read '{key}'"))?;
                writer.write_all(&chunk)?;
            }
            writer.flush()?;
            ScopeGuard::into_inner(cleanup);
            Ok::<_, StorageError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use object_store::{PutPayload, memory::InMemory};

    use super::*;

    fn seeded(keys: &[(&str, &[u8])]) -> (Runtime, CloudStore) {
        let rt = Runtime::new().unwrap();
        let store = Arc::new(InMemory::new());
        rt.block_on(async {
            for (key, data) in keys {
                store
                    .put(&ObjectPath::from(*key), PutPayload::from(data.to_vec()))
                    .await
                    .unwrap();
            }
        });
        (rt, CloudStore::new("memory", store))
    }

    #[test]
    fn lists_recursively_under_prefix() {
        let (rt, store) = seeded(&[
            ("models/v1/model.pkl", b"model"),
            ("models/v1/assets/vocab.txt", b"vocab"),
            ("models/v2/model.pkl", b"other"),
        ]);

        let mut keys: Vec<_> = store
            .list(&rt, "models/v1")
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        keys.sort();

        assert_eq!(keys, ["models/v1/assets/vocab.txt", "models/v1/model.pkl"]);
    }

    #[test]
    fn prefix_naming_one_object_lists_it() {
        let (rt, store) = seeded(&[("models/model.pkl", b"model")]);

        let objects = store.list(&rt, "models/model.pkl").unwrap();
        assert_eq!(objects, [RemoteObject::new("models/model.pkl")]);
        assert!(store.list(&rt, "missing").unwrap().is_empty());
    }

    #[test]
    fn key_prefix_listing_matches_partial_names() {
        let (rt, store) = seeded(&[
            ("models/model.pkl", b"model"),
            ("models/model-assets/a.bin", b"asset"),
            ("models/other.pkl", b"other"),
            ("top.bin", b"top"),
        ]);

        let keys = |prefix: &str| {
            let mut keys: Vec<_> = store
                .list_by_key_prefix(&rt, prefix)
                .unwrap()
                .into_iter()
                .map(|o| o.key)
                .collect();
            keys.sort();
            keys
        };

        assert_eq!(
            keys("models/model"),
            ["models/model-assets/a.bin", "models/model.pkl"]
        );
        assert_eq!(
            keys("models/"),
            [
                "models/model-assets/a.bin",
                "models/model.pkl",
                "models/other.pkl"
            ]
        );
        assert_eq!(keys("models/model.pkl"), ["models/model.pkl"]);
        assert_eq!(keys("to"), ["top.bin"]);
        assert!(keys("models/none").is_empty());
    }

    #[test]
    fn fetches_bytes_to_file() {
        let (rt, store) = seeded(&[("models/model.pkl", b"model")]);
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("model.pkl");

        store
            .fetch(&rt, "models/model.pkl", &dest, &CancelFlag::new())
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"model");

        let err = store
            .fetch(&rt, "models/missing.pkl", &dest, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend { backend: "memory", .. }));
    }

    #[test]
    fn cancelled_fetch_removes_partial_file() {
        let (rt, store) = seeded(&[("models/model.pkl", b"model")]);
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("model.pkl");
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = store
            .fetch(&rt, "models/model.pkl", &dest, &cancel)
            .unwrap_err();

        assert!(matches!(err, StorageError::Cancelled { .. }));
        assert!(!dest.exists());
    }
}
