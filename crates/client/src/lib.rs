//! Event-record assembly and tracking client for Beacon
//!
//! This crate composes the core property tree and the consumer sinks
//! into the user-facing API: an [`Analytics`] client that validates
//! names, merges default ("super") properties into each event, injects
//! the reserved fields (`type`, `distinct_id`, `time`, `lib`), encodes
//! the record as one JSON line, and hands it to the configured consumer.
//!
//! # Quick Start
//!
//! ```ignore
//! use beacon_client::Analytics;
//! use beacon_core::Properties;
//! use beacon_sinks::LoggingConsumer;
//!
//! let sa = Analytics::new(LoggingConsumer::new("/data/logs/events"));
//!
//! let mut props = Properties::new();
//! props.add_number("product_price", 5888.0)?;
//! sa.track("ABCDEF123456789", "ViewProduct", Some(&props))?;
//! sa.flush()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod validate;

use std::panic::Location;

use beacon_core::{encode, EncodeOptions, Error, Properties, Result, StringBuffer};
use beacon_sinks::Consumer;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

/// Value of the `$lib` field in every record
const LIB: &str = "rust";
/// Value of the `$lib_version` field in every record
const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Value of the `$lib_method` field in every record
const LIB_METHOD: &str = "code";

/// Wire-level record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// A behavioral event for a subject
    Track,
    /// Links an anonymous id to a registered id
    TrackSignup,
    /// Set profile properties, overwriting existing ones
    ProfileSet,
    /// Set profile properties only where not already present
    ProfileSetOnce,
    /// Increment numeric profile properties
    ProfileIncrement,
    /// Append elements to list-typed profile properties
    ProfileAppend,
    /// Remove named profile properties
    ProfileUnset,
    /// Delete the whole profile
    ProfileDelete,
}

impl RecordType {
    /// The `type` field value written on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Track => "track",
            RecordType::TrackSignup => "track_signup",
            RecordType::ProfileSet => "profile_set",
            RecordType::ProfileSetOnce => "profile_set_once",
            RecordType::ProfileIncrement => "profile_increment",
            RecordType::ProfileAppend => "profile_append",
            RecordType::ProfileUnset => "profile_unset",
            RecordType::ProfileDelete => "profile_delete",
        }
    }

    /// Whether records of this type carry an `event` field
    fn carries_event(self) -> bool {
        matches!(self, RecordType::Track | RecordType::TrackSignup)
    }
}

/// The tracking client
///
/// Owns the consumer and the default ("super") properties. Default
/// properties are merged into every subsequent `track`/`track_signup`
/// record until unregistered; they live behind a single mutex, and every
/// traversal (copying them into an event, registering, unregistering,
/// clearing) holds that lock for its whole duration. All operations are
/// synchronous calls on the caller's thread.
pub struct Analytics<C: Consumer> {
    super_properties: Mutex<Properties>,
    consumer: Mutex<C>,
    options: EncodeOptions,
}

impl<C: Consumer> Analytics<C> {
    /// Create a client delivering records to `consumer`
    pub fn new(consumer: C) -> Self {
        Analytics {
            super_properties: Mutex::new(Properties::new()),
            consumer: Mutex::new(consumer),
            options: EncodeOptions::default(),
        }
    }

    /// Flush the consumer's buffered output
    pub fn flush(&self) -> Result<()> {
        self.consumer.lock().flush()
    }

    /// Flush and release the consumer's resources
    pub fn close(&self) -> Result<()> {
        self.consumer.lock().close()
    }

    /// Merge `properties` into the default set applied to every event
    ///
    /// Each child is added independently (shared by reference, replacing
    /// any default with an equal key); a failure partway does not roll
    /// back children already added. Per-call properties win over
    /// defaults on key conflict at track time.
    pub fn register_super_properties(&self, properties: &Properties) -> Result<()> {
        let mut supers = self.super_properties.lock();
        for child in properties.iter() {
            supers.insert(child.clone())?;
        }
        Ok(())
    }

    /// Remove one default property by key
    pub fn unregister_super_property(&self, key: &str) {
        self.super_properties.lock().remove(key);
    }

    /// Remove all default properties
    pub fn clear_super_properties(&self) {
        self.super_properties.lock().clear();
    }

    /// Record a behavioral event for a subject
    #[track_caller]
    pub fn track(&self, distinct_id: &str, event: &str, properties: Option<&Properties>) -> Result<()> {
        self.track_internal(
            distinct_id,
            None,
            RecordType::Track,
            Some(event),
            properties,
            Location::caller(),
        )
    }

    /// Link an anonymous id (`original_id`) to a registered id
    #[track_caller]
    pub fn track_signup(
        &self,
        distinct_id: &str,
        original_id: &str,
        properties: Option<&Properties>,
    ) -> Result<()> {
        self.track_internal(
            distinct_id,
            Some(original_id),
            RecordType::TrackSignup,
            Some("$SignUp"),
            properties,
            Location::caller(),
        )
    }

    /// Set profile properties, overwriting existing ones
    #[track_caller]
    pub fn profile_set(&self, distinct_id: &str, properties: &Properties) -> Result<()> {
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileSet,
            None,
            Some(properties),
            Location::caller(),
        )
    }

    /// Set profile properties only where not already present
    #[track_caller]
    pub fn profile_set_once(&self, distinct_id: &str, properties: &Properties) -> Result<()> {
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileSetOnce,
            None,
            Some(properties),
            Location::caller(),
        )
    }

    /// Increment numeric profile properties by the given amounts
    #[track_caller]
    pub fn profile_increment(&self, distinct_id: &str, properties: &Properties) -> Result<()> {
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileIncrement,
            None,
            Some(properties),
            Location::caller(),
        )
    }

    /// Append elements to list-typed profile properties
    #[track_caller]
    pub fn profile_append(&self, distinct_id: &str, properties: &Properties) -> Result<()> {
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileAppend,
            None,
            Some(properties),
            Location::caller(),
        )
    }

    /// Remove one profile property by key
    #[track_caller]
    pub fn profile_unset(&self, distinct_id: &str, key: &str) -> Result<()> {
        let mut properties = Properties::new();
        properties.add_bool(key, true)?;
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileUnset,
            None,
            Some(&properties),
            Location::caller(),
        )
    }

    /// Delete the whole profile
    #[track_caller]
    pub fn profile_delete(&self, distinct_id: &str) -> Result<()> {
        let properties = Properties::new();
        self.track_internal(
            distinct_id,
            None,
            RecordType::ProfileDelete,
            None,
            Some(&properties),
            Location::caller(),
        )
    }

    /// Reject malformed input before any record state is assembled
    fn check_legality(
        &self,
        distinct_id: &str,
        original_id: Option<&str>,
        record_type: RecordType,
        event: Option<&str>,
        properties: Option<&Properties>,
    ) -> Result<()> {
        validate::check_id("distinct id", distinct_id).map_err(|e| {
            warn!(distinct_id, "rejecting record: invalid distinct id");
            e
        })?;
        if record_type == RecordType::TrackSignup {
            validate::check_id("original id", original_id.unwrap_or("")).map_err(|e| {
                warn!(original_id, "rejecting record: invalid original id");
                e
            })?;
        }
        if record_type.carries_event() {
            let event = event.ok_or_else(|| {
                Error::InvalidParameter("an event name is required".to_string())
            })?;
            validate::check_name(event).map_err(|e| {
                warn!(event, "rejecting record: invalid event name");
                e
            })?;
        }
        if let Some(properties) = properties {
            for child in properties.iter() {
                let key = child.key().ok_or_else(|| {
                    Error::InvalidParameter("a property key is required".to_string())
                })?;
                validate::check_name(key).map_err(|e| {
                    warn!(key, "rejecting record: invalid property name");
                    e
                })?;
            }
        }
        Ok(())
    }

    /// Assemble, encode and send one record
    ///
    /// Field insertion order is fixed because the child order of the
    /// record dictionary (most-recently-added-first) is observable in
    /// the output line.
    fn track_internal(
        &self,
        distinct_id: &str,
        original_id: Option<&str>,
        record_type: RecordType,
        event: Option<&str>,
        properties: Option<&Properties>,
        location: &Location<'_>,
    ) -> Result<()> {
        self.check_legality(distinct_id, original_id, record_type, event, properties)?;

        let mut record = Properties::new();
        record.add_string("type", record_type.as_str())?;
        record.add_string("distinct_id", distinct_id)?;
        if record_type == RecordType::TrackSignup {
            record.add_string("original_id", original_id.unwrap_or_default())?;
        }
        if record_type.carries_event() {
            record.add_string("event", event.unwrap_or_default())?;
        }
        record.add_int("time", Utc::now().timestamp_millis())?;

        let mut lib = Properties::new();
        lib.add_string("$lib", LIB)?;
        lib.add_string("$lib_version", LIB_VERSION)?;
        lib.add_string("$lib_method", LIB_METHOD)?;
        lib.add_string(
            "$lib_detail",
            &format!("####{}##{}", location.file(), location.line()),
        )?;
        record.insert(lib.into_node(Some("lib")))?;

        let mut inner = Properties::new();
        if record_type.carries_event() {
            inner.add_string("$lib", LIB)?;
            inner.add_string("$lib_version", LIB_VERSION)?;
            // Copy the defaults while holding the lock for the whole
            // traversal; per-call properties below overwrite on conflict.
            let supers = self.super_properties.lock();
            for child in supers.iter() {
                inner.insert(child.clone())?;
            }
        }
        if let Some(properties) = properties {
            for child in properties.iter() {
                match child.key() {
                    Some("$time") => {
                        // A $time property overrides the record's time.
                        let (seconds, microseconds) = child.as_date().ok_or_else(|| {
                            Error::InvalidParameter(format!(
                                "$time must be a Date property, got {}",
                                child.tag_name()
                            ))
                        })?;
                        record.add_int(
                            "time",
                            seconds * 1000 + i64::from(microseconds) / 1000,
                        )?;
                    }
                    Some("$project") => {
                        // A $project property is rewritten to a
                        // top-level project field.
                        let project = child.as_str().ok_or_else(|| {
                            Error::InvalidParameter(format!(
                                "$project must be a String property, got {}",
                                child.tag_name()
                            ))
                        })?;
                        record.add_string("project", project)?;
                    }
                    _ => {
                        inner.insert(child.clone())?;
                    }
                }
            }
        }
        record.insert(inner.into_node(Some("properties")))?;

        let mut sb = StringBuffer::new();
        encode(&record.into_node(None), &mut sb, &self.options)?;
        let encoded = sb.finish();
        self.consumer.lock().send(&encoded)
    }
}
