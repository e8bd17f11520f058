// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! MongoDB shim.
//!
//! Writes insert the single-field document `{key: value}` into one fixed
//! collection. Reads depend on [`MongoReadMode`]:
//!
//! - `Document`: find one document equal to `{key: value}`. With a freshly
//!   generated value this almost never matches, which is the intended load
//!   shape (a full collection scan that comes back empty).
//! - `Key`: find one document that has a `key` field at all.

use async_trait::async_trait;
use meshreplay_core::{Backend, NodeId, OpType};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;

use crate::config::{MongoConfig, MongoReadMode};
use crate::connection::StorageConnection;
use crate::error::StorageError;

pub struct MongoConnection {
    node: NodeId,
    collection: Collection<Document>,
    read_mode: MongoReadMode,
}

impl MongoConnection {
    pub async fn connect(
        node: &NodeId,
        addr: &str,
        config: &MongoConfig,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let mut options = ClientOptions::parse(format!("mongodb://{addr}"))
            .await
            .map_err(|e| StorageError::connect(Backend::Mongo, node, e))?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options)
            .map_err(|e| StorageError::connect(Backend::Mongo, node, e))?;

        // Client construction is lazy; ping so an unreachable node fails here
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StorageError::connect(Backend::Mongo, node, e))?;

        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self {
            node: node.clone(),
            collection,
            read_mode: config.read_mode,
        })
    }
}

fn read_filter(mode: MongoReadMode, key: &str, value: Option<&str>) -> Document {
    let mut filter = Document::new();
    match (mode, value) {
        (MongoReadMode::Document, Some(value)) => {
            filter.insert(key, value);
        }
        _ => {
            filter.insert(key, doc! { "$exists": true });
        }
    }
    filter
}

#[async_trait]
impl StorageConnection for MongoConnection {
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut document = Document::new();
        document.insert(key, value);

        self.collection
            .insert_one(document, None)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::operation(Backend::Mongo, OpType::Write, &self.node, e))
    }

    async fn read(&self, key: &str, value: Option<&str>) -> Result<Option<String>, StorageError> {
        let filter = read_filter(self.read_mode, key, value);

        let found = self
            .collection
            .find_one(filter, None)
            .await
            .map_err(|e| StorageError::operation(Backend::Mongo, OpType::Read, &self.node, e))?;

        Ok(found.map(|document| match document.get(key) {
            Some(Bson::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_mode_filter() {
        let filter = read_filter(MongoReadMode::Document, "k1", Some("abc"));
        assert_eq!(filter, doc! { "k1": "abc" });
    }

    #[test]
    fn test_key_mode_filter() {
        let filter = read_filter(MongoReadMode::Key, "k1", Some("abc"));
        assert_eq!(filter, doc! { "k1": { "$exists": true } });

        // no value to match on falls back to key presence
        let filter = read_filter(MongoReadMode::Document, "k1", None);
        assert_eq!(filter, doc! { "k1": { "$exists": true } });
    }
}
