use crate::config::StoreConfig;
use crate::host::{HostDocuments, SaveOptions};
use crate::world_info::BookGroups;
use crate::{Result, StoreError};
use log::debug;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Persistence of world-info groups, one [`BookGroups`] per world book.
pub struct WorldInfoStore<H: ?Sized> {
    host: Arc<H>,
    config: StoreConfig,
}

impl<H: HostDocuments + ?Sized> WorldInfoStore<H> {
    pub fn new(host: Arc<H>, config: StoreConfig) -> Self {
        Self { host, config }
    }

    /// Normalized groups of `book`; empty when nothing is stored.
    pub fn book(&self, book: &str) -> Result<BookGroups> {
        let document = self.load()?;
        Ok(self.book_from(&document, book))
    }

    /// Read-modify-write of one book. `edit` runs against a freshly read copy.
    pub async fn edit<T>(
        &self,
        book: &str,
        edit: impl FnOnce(&mut BookGroups) -> Result<T> + Send,
    ) -> Result<T> {
        let mut document = self.load()?;
        let mut groups = self.book_from(&document, book);
        let out = edit(&mut groups)?;
        groups.normalize();

        let root = document
            .as_object_mut()
            .ok_or_else(|| StoreError::validation("settings document is not an object"))?;
        let books = root
            .entry(self.config.world_info_key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !books.is_object() {
            *books = Value::Object(Map::new());
        }
        if let Some(books) = books.as_object_mut() {
            books.insert(book.to_string(), serde_json::to_value(&groups)?);
        }

        self.host
            .save_container(
                &self.config.world_info_container,
                document,
                SaveOptions::default(),
            )
            .await?;
        debug!("saved world-info groups for {book}");
        Ok(out)
    }

    pub async fn create_group(&self, book: &str, name: &str) -> Result<String> {
        let default_name = self.config.default_group_name.clone();
        self.edit(book, move |groups| Ok(groups.create_group(name, &default_name)))
            .await
    }

    pub async fn rename_group(&self, book: &str, id: &str, name: &str) -> Result<()> {
        let default_name = self.config.default_group_name.clone();
        self.edit(book, move |groups| groups.rename_group(id, name, &default_name))
            .await
    }

    pub async fn delete_group(&self, book: &str, id: &str) -> Result<()> {
        self.edit(book, |groups| groups.delete_group(id).map(|_| ()))
            .await
    }

    pub async fn toggle_collapsed(&self, book: &str, id: &str) -> Result<bool> {
        self.edit(book, |groups| groups.toggle_collapsed(id)).await
    }

    pub async fn set_all_collapsed(&self, book: &str, collapsed: bool) -> Result<()> {
        self.edit(book, |groups| {
            groups.set_all_collapsed(collapsed);
            Ok(())
        })
        .await
    }

    pub async fn add_entry(&self, book: &str, id: &str, uid: u64) -> Result<()> {
        self.edit(book, |groups| groups.add_entry(id, uid)).await
    }

    pub async fn remove_entry(&self, book: &str, uid: u64) -> Result<Option<String>> {
        self.edit(book, |groups| Ok(groups.remove_entry(uid))).await
    }

    /// Create a group and tag `uid` with it in one write.
    pub async fn create_and_add(&self, book: &str, name: &str, uid: u64) -> Result<String> {
        let default_name = self.config.default_group_name.clone();
        self.edit(book, move |groups| {
            let id = groups.create_group(name, &default_name);
            groups.add_entry(&id, uid)?;
            Ok(id)
        })
        .await
    }

    pub async fn move_group(&self, book: &str, from: usize, to: usize) -> Result<()> {
        self.edit(book, |groups| groups.move_group(from, to)).await
    }

    fn load(&self) -> Result<Value> {
        Ok(self
            .host
            .container(&self.config.world_info_container)?
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn book_from(&self, document: &Value, book: &str) -> BookGroups {
        document
            .get(&self.config.world_info_key)
            .and_then(|books| books.get(book))
            .map(|value| BookGroups::from_value(value, &self.config.default_group_name))
            .unwrap_or_default()
    }
}
