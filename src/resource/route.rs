//! Route addressing and operation bitmasks.
//!
//! A route is an `objectId/instanceId/resourceId` triple. Ordering is
//! numeric by object, then instance, then resource, which is what makes the
//! object model deterministic.

use std::fmt;
use std::str::FromStr;

use crate::error::{EdgeError, Result};
use crate::resource::ResourceKind;

/// Address of a resource: object / instance / resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoutePath {
    /// Object id.
    pub object_id: u32,
    /// Object instance id.
    pub instance_id: u32,
    /// Resource id.
    pub resource_id: u32,
}

impl RoutePath {
    /// Create a route from its numeric parts.
    pub fn new(object_id: u32, instance_id: u32, resource_id: u32) -> Self {
        Self {
            object_id,
            instance_id,
            resource_id,
        }
    }

    /// Parse `"3200/0/5501"`; a single leading `/` is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRouteFormat` unless the text is exactly three
    /// unsigned decimal integers separated by `/`.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || EdgeError::InvalidRouteFormat(text.to_string());
        let trimmed = text.strip_prefix('/').unwrap_or(text);

        let mut parts = trimmed.split('/');
        let mut next = || -> Result<u32> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let route = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(route)
    }
}

impl FromStr for RoutePath {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.object_id, self.instance_id, self.resource_id
        )
    }
}

/// Allowed-operations bitmask (GET=1, PUT=2, POST=4, DELETE=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operations(u8);

impl Operations {
    /// No operations allowed.
    pub const NONE: Operations = Operations(0x00);
    /// GET only.
    pub const GET: Operations = Operations(0x01);
    /// PUT only.
    pub const PUT: Operations = Operations(0x02);
    /// GET and PUT allowed.
    pub const GET_PUT: Operations = Operations(0x03);
    /// POST only (functions).
    pub const POST: Operations = Operations(0x04);
    /// GET and POST allowed.
    pub const GET_POST: Operations = Operations(0x05);
    /// PUT and POST allowed.
    pub const PUT_POST: Operations = Operations(0x06);
    /// GET, PUT and POST allowed.
    pub const GET_PUT_POST: Operations = Operations(0x07);
    /// DELETE only.
    pub const DELETE: Operations = Operations(0x08);
    /// GET and DELETE allowed.
    pub const GET_DELETE: Operations = Operations(0x09);
    /// PUT and DELETE allowed.
    pub const PUT_DELETE: Operations = Operations(0x0A);
    /// Everything but POST.
    pub const GET_PUT_DELETE: Operations = Operations(0x0B);
    /// POST and DELETE allowed.
    pub const POST_DELETE: Operations = Operations(0x0C);
    /// Everything but PUT.
    pub const GET_POST_DELETE: Operations = Operations(0x0D);
    /// Everything but GET.
    pub const PUT_POST_DELETE: Operations = Operations(0x0E);
    /// Every operation allowed.
    pub const ALL: Operations = Operations(0x0F);

    /// Build from raw bits, rejecting anything above 15.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits <= Self::ALL.0).then_some(Operations(bits))
    }

    /// Raw bits.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Check that every bit of `other` is set.
    #[inline]
    pub fn contains(self, other: Operations) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check the mask against a route kind.
    ///
    /// Functions are POST-only; value routes may not allow POST.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperations` naming `route` on mismatch.
    pub fn validate_for(self, kind: ResourceKind, route: &RoutePath) -> Result<()> {
        let reason = match kind {
            ResourceKind::Function if self != Operations::POST => {
                Some("function routes are POST-only")
            }
            ResourceKind::Function => None,
            _ if self.contains(Operations::POST) => Some("value routes cannot be executed (POST)"),
            _ => None,
        };

        match reason {
            Some(reason) => Err(EdgeError::InvalidOperations {
                route: route.to_string(),
                operations: self.0,
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl Default for Operations {
    fn default() -> Self {
        Operations::GET_PUT
    }
}

impl std::ops::BitOr for Operations {
    type Output = Operations;

    fn bitor(self, rhs: Operations) -> Operations {
        Operations(self.0 | rhs.0)
    }
}
