//! Devices and their resource registries.
//!
//! A [`Device`] owns a set of routes. Creating a route only records it
//! locally; the gateway learns about all routes at once in
//! [`Device::register`], and about value changes through
//! [`Device::set_value`], which always sends the full object model.
//!
//! Writes from the gateway arrive as push notifications and update the local
//! value (or invoke the function callback) on the read loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use super::model::{build_object_model, ResourceEntry, ResourceOptions, WireObject};
use super::route::{Operations, RoutePath};
use super::value::{ResourceKind, ResourceValue};
use crate::codec::ValueCodec;
use crate::error::{EdgeError, Result};
use crate::rpc::{EventKind, EventScope, ResourceEvent, Subscription, WRITE_METHOD};
use crate::session::Session;

const DEVICE_REGISTER_METHOD: &str = "device_register";
const DEVICE_UNREGISTER_METHOD: &str = "device_unregister";

type RouteTable = Arc<RwLock<BTreeMap<RoutePath, ResourceEntry>>>;

/// A device exposed to the gateway through this translator.
///
/// Listeners are removed by [`terminate`](Self::terminate) or on drop.
pub struct Device {
    id: String,
    session: Session,
    routes: RouteTable,
    registered: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Device {
    /// Create an empty device. Prefer [`Session::device`].
    pub fn new(id: impl Into<String>, session: Session) -> Self {
        Self {
            id: id.into(),
            session,
            routes: Arc::new(RwLock::new(BTreeMap::new())),
            registered: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Device id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `device_register` succeeded and no unregister followed.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Add a value route.
    ///
    /// Gateway writes to the route replace the local value.
    ///
    /// # Errors
    ///
    /// - `NotOpen` unless the session is open
    /// - `InvalidRouteFormat` for malformed routes
    /// - `MissingValue` if `value` is `None`
    /// - `FunctionRoute` for the function kind, use [`create_function`](Self::create_function)
    /// - `KindMismatch` if the value does not match `kind`
    /// - `InvalidOperations` if the mask allows POST
    /// - `DuplicateRoute` if the route exists
    pub fn create_resource(
        &self,
        kind: ResourceKind,
        route: &str,
        value: Option<ResourceValue>,
        options: ResourceOptions,
    ) -> Result<RoutePath> {
        self.session.ensure_open()?;
        let path = RoutePath::parse(route)?;
        let value = value.ok_or_else(|| EdgeError::MissingValue(path.to_string()))?;

        if kind == ResourceKind::Function {
            return Err(EdgeError::FunctionRoute(path.to_string()));
        }
        if value.kind() != kind {
            return Err(EdgeError::KindMismatch {
                route: path.to_string(),
                expected: kind.name(),
                actual: value.kind().name(),
            });
        }
        options.operations.validate_for(kind, &path)?;

        self.insert(
            path,
            ResourceEntry {
                kind,
                value: Some(value),
                options,
            },
        )?;

        let routes = self.routes.clone();
        self.subscribe(path, EventKind::Updated, move |event| {
            apply_update(&routes, kind, event)
        });

        tracing::debug!(device_id = %self.id, route = %path, %kind, "created resource");
        Ok(path)
    }

    /// Add a string route with default options.
    pub fn create_string(&self, route: &str, value: impl Into<String>) -> Result<RoutePath> {
        self.create_resource(
            ResourceKind::String,
            route,
            Some(ResourceValue::String(value.into())),
            ResourceOptions::default(),
        )
    }

    /// Add an int route with default options.
    pub fn create_int(&self, route: &str, value: i32) -> Result<RoutePath> {
        self.create_resource(
            ResourceKind::Int,
            route,
            Some(ResourceValue::Int(value)),
            ResourceOptions::default(),
        )
    }

    /// Add a float route with default options.
    pub fn create_float(&self, route: &str, value: f32) -> Result<RoutePath> {
        self.create_resource(
            ResourceKind::Float,
            route,
            Some(ResourceValue::Float(value)),
            ResourceOptions::default(),
        )
    }

    /// Add a POST-only function route.
    ///
    /// `callback` runs on the read loop with the execute payload, so it
    /// should hand long work off to a task.
    pub fn create_function<F>(&self, route: &str, callback: F) -> Result<RoutePath>
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.session.ensure_open()?;
        let path = RoutePath::parse(route)?;

        self.insert(
            path,
            ResourceEntry {
                kind: ResourceKind::Function,
                value: None,
                options: ResourceOptions::with_operations(Operations::POST),
            },
        )?;

        self.subscribe(path, EventKind::Executed, move |event| {
            callback(event.value.clone())
        });

        tracing::debug!(device_id = %self.id, route = %path, "created function");
        Ok(path)
    }

    /// Set a route's value and push the full object model with `write`.
    ///
    /// The local value is updated before the call, so it stays updated
    /// even when the call fails.
    ///
    /// # Errors
    ///
    /// - `NotOpen` unless the session is open
    /// - `UnknownRoute`, `FunctionRoute`, `KindMismatch` for bad targets
    /// - any error of the `write` call
    pub async fn set_value(&self, route: &str, value: impl Into<ResourceValue>) -> Result<Value> {
        self.session.ensure_open()?;
        let path = RoutePath::parse(route)?;
        let value = value.into();

        {
            let mut routes = self.routes.write();
            let entry = routes
                .get_mut(&path)
                .ok_or_else(|| EdgeError::UnknownRoute(path.to_string()))?;
            if entry.kind == ResourceKind::Function {
                return Err(EdgeError::FunctionRoute(path.to_string()));
            }
            if entry.kind != value.kind() {
                return Err(EdgeError::KindMismatch {
                    route: path.to_string(),
                    expected: entry.kind.name(),
                    actual: value.kind().name(),
                });
            }
            entry.value = Some(value);
        }

        self.session
            .call(WRITE_METHOD, self.params_with_objects()?)
            .await
    }

    /// Current value of a route; `None` for unknown routes and functions.
    pub fn value(&self, route: &str) -> Option<ResourceValue> {
        let path = RoutePath::parse(route).ok()?;
        self.routes.read().get(&path)?.value.clone()
    }

    /// Options a route was created with.
    pub fn options(&self, route: &str) -> Option<ResourceOptions> {
        let path = RoutePath::parse(route).ok()?;
        self.routes.read().get(&path).map(|entry| entry.options)
    }

    /// All routes, sorted.
    pub fn routes(&self) -> Vec<RoutePath> {
        self.routes.read().keys().copied().collect()
    }

    /// The object model as sent to the gateway.
    pub fn object_model(&self) -> Vec<WireObject> {
        build_object_model(self.routes.read().iter())
    }

    /// Register the device and all its routes with the gateway.
    pub async fn register(&self) -> Result<Value> {
        let response = self
            .session
            .call(DEVICE_REGISTER_METHOD, self.params_with_objects()?)
            .await?;
        self.registered.store(true, Ordering::Release);
        tracing::info!(device_id = %self.id, "device registered");
        Ok(response)
    }

    /// Unregister the device. Does nothing unless registered.
    pub async fn unregister(&self) -> Result<()> {
        if !self.is_registered() {
            return Ok(());
        }
        self.session
            .call(DEVICE_UNREGISTER_METHOD, json!({ "deviceId": self.id }))
            .await?;
        self.registered.store(false, Ordering::Release);
        tracing::info!(device_id = %self.id, "device unregistered");
        Ok(())
    }

    /// Remove every listener this device installed.
    pub fn terminate(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in &subscriptions {
            self.session.events().unsubscribe(subscription);
        }
    }

    fn insert(&self, path: RoutePath, entry: ResourceEntry) -> Result<()> {
        let mut routes = self.routes.write();
        if routes.contains_key(&path) {
            return Err(EdgeError::DuplicateRoute(path.to_string()));
        }
        routes.insert(path, entry);
        Ok(())
    }

    fn subscribe<F>(&self, route: RoutePath, kind: EventKind, listener: F)
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        let scope = EventScope::new(self.id.clone(), route, kind);
        let subscription = self.session.events().subscribe(scope, listener);
        self.subscriptions.lock().push(subscription);
    }

    fn params_with_objects(&self) -> Result<Value> {
        Ok(json!({
            "deviceId": self.id,
            "objects": serde_json::to_value(self.object_model())?,
        }))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("routes", &self.routes.read().len())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Decode a pushed value and store it; undecodable payloads are dropped.
fn apply_update(routes: &RouteTable, kind: ResourceKind, event: &ResourceEvent) {
    let value = match ValueCodec::decode(kind, &event.value) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                device_id = %event.device_id,
                route = %event.route,
                error = %e,
                "ignoring undecodable update"
            );
            return;
        }
    };

    if let Some(entry) = routes.write().get_mut(&event.route) {
        tracing::debug!(device_id = %event.device_id, route = %event.route, %value, "value updated by gateway");
        entry.value = Some(value);
    }
}
