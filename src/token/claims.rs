use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClaimsError;

/// A gallery, optionally narrowed to one image in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    gallery_id: String,
    image_id: Option<String>,
}

impl ResourceId {
    pub fn new(gallery_id: impl Into<String>, image_id: Option<String>) -> Result<Self, ClaimsError> {
        let gallery_id = gallery_id.into();
        if gallery_id.is_empty() {
            return Err(ClaimsError::EmptyGallery);
        }
        if image_id.as_deref() == Some("") {
            return Err(ClaimsError::EmptyImage);
        }
        Ok(Self {
            gallery_id,
            image_id,
        })
    }

    /// Any image within `gallery_id`.
    pub fn gallery(gallery_id: impl Into<String>) -> Result<Self, ClaimsError> {
        Self::new(gallery_id, None)
    }

    /// Exactly `image_id` within `gallery_id`.
    pub fn image(gallery_id: impl Into<String>, image_id: impl Into<String>) -> Result<Self, ClaimsError> {
        Self::new(gallery_id, Some(image_id.into()))
    }

    pub fn gallery_id(&self) -> &str {
        &self.gallery_id
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image_id.as_deref()
    }

    /// Whether a token bound to `self` authorizes access to `requested`.
    ///
    /// Galleries must match exactly. A bound image must equal the requested
    /// one; an unbound token covers every image in the gallery.
    pub fn authorizes(&self, requested: &ResourceId) -> bool {
        if self.gallery_id != requested.gallery_id {
            return false;
        }
        match &self.image_id {
            Some(bound) => requested.image_id.as_deref() == Some(bound.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image_id {
            Some(img) => write!(f, "{}/{}", self.gallery_id, img),
            None => write!(f, "{}/*", self.gallery_id),
        }
    }
}

/// Non-empty set of capability strings such as `image:read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Result<Self, ClaimsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = scopes
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if set.is_empty() {
            return Err(ClaimsError::EmptyScope);
        }
        Ok(Self(set))
    }

    /// Space-separated scope list, e.g. `"image:read image:list"`.
    pub fn parse(scopes: &str) -> Result<Self, ClaimsError> {
        Self::new(scopes.split_whitespace())
    }

    pub fn single(scope: &str) -> Result<Self, ClaimsError> {
        Self::new([scope])
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Claims carried by a capability token. Field names are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
    exp: i64,
    jti: String,
    gid: String,
    scp: ScopeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    img: Option<String>,
}

impl Claims {
    /// Build a fresh claim set valid from `now_unix` for `ttl`, with a new
    /// random token id.
    pub fn new(
        issuer: &str,
        audience: &str,
        subject: &str,
        resource: &ResourceId,
        scope: ScopeSet,
        ttl: Duration,
        now_unix: i64,
    ) -> Result<Self, ClaimsError> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 || ttl_secs > i64::MAX as u64 {
            return Err(ClaimsError::NonPositiveTtl);
        }
        if subject.is_empty() {
            return Err(ClaimsError::EmptySubject);
        }
        if scope.is_empty() {
            return Err(ClaimsError::EmptyScope);
        }
        Ok(Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            sub: subject.to_string(),
            iat: now_unix,
            nbf: Some(now_unix),
            exp: now_unix.saturating_add(ttl_secs as i64),
            jti: Uuid::new_v4().to_string(),
            gid: resource.gallery_id().to_string(),
            scp: scope,
            img: resource.image_id().map(String::from),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.iss
    }

    pub fn audience(&self) -> &str {
        &self.aud
    }

    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> i64 {
        self.iat
    }

    pub fn not_before(&self) -> Option<i64> {
        self.nbf
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// Unique id of this issuance; the replay key.
    pub fn token_id(&self) -> &str {
        &self.jti
    }

    pub fn scope(&self) -> &ScopeSet {
        &self.scp
    }

    pub fn gallery_id(&self) -> &str {
        &self.gid
    }

    pub fn image_id(&self) -> Option<&str> {
        self.img.as_deref()
    }

    /// The resource this token is bound to.
    pub fn resource(&self) -> ResourceId {
        ResourceId {
            gallery_id: self.gid.clone(),
            image_id: self.img.clone(),
        }
    }

    /// Seconds left before expiry at `now_unix`, never negative.
    pub fn remaining_secs(&self, now_unix: i64) -> u64 {
        self.exp.saturating_sub(now_unix).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_scope() -> ScopeSet {
        ScopeSet::single("image:read").unwrap()
    }

    #[test]
    fn test_new_sets_time_bounds() {
        let res = ResourceId::image("g1", "a.jpg").unwrap();
        let claims = Claims::new("iss", "aud", "alice", &res, read_scope(), Duration::from_secs(300), 1_000).unwrap();
        assert_eq!(claims.issued_at(), 1_000);
        assert_eq!(claims.not_before(), Some(1_000));
        assert_eq!(claims.expires_at(), 1_300);
        assert_eq!(claims.resource(), res);
        assert_eq!(claims.remaining_secs(1_100), 200);
        assert_eq!(claims.remaining_secs(2_000), 0);
    }

    #[test]
    fn test_token_ids_are_unique() {
        let res = ResourceId::gallery("g1").unwrap();
        let a = Claims::new("i", "a", "s", &res, read_scope(), Duration::from_secs(60), 0).unwrap();
        let b = Claims::new("i", "a", "s", &res, read_scope(), Duration::from_secs(60), 0).unwrap();
        assert_ne!(a.token_id(), b.token_id());
    }

    #[test]
    fn test_rejects_invalid_construction() {
        let res = ResourceId::gallery("g1").unwrap();
        assert_eq!(
            Claims::new("i", "a", "s", &res, read_scope(), Duration::from_millis(999), 0),
            Err(ClaimsError::NonPositiveTtl)
        );
        assert_eq!(
            Claims::new("i", "a", "", &res, read_scope(), Duration::from_secs(1), 0),
            Err(ClaimsError::EmptySubject)
        );
        assert_eq!(ScopeSet::parse("   "), Err(ClaimsError::EmptyScope));
        assert_eq!(ResourceId::gallery(""), Err(ClaimsError::EmptyGallery));
        assert_eq!(ResourceId::image("g", ""), Err(ClaimsError::EmptyImage));
    }

    #[test]
    fn test_scope_membership() {
        let scopes = ScopeSet::parse("image:read  image:list").unwrap();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("image:read"));
        assert!(!scopes.contains("image:write"));
    }

    #[test]
    fn test_resource_binding() {
        let bound = ResourceId::image("g1", "x").unwrap();
        let whole = ResourceId::gallery("g1").unwrap();
        let x = ResourceId::image("g1", "x").unwrap();
        let y = ResourceId::image("g1", "y").unwrap();
        let other = ResourceId::image("g2", "x").unwrap();

        assert!(bound.authorizes(&x));
        assert!(!bound.authorizes(&y));
        assert!(whole.authorizes(&x));
        assert!(whole.authorizes(&y));
        assert!(!whole.authorizes(&other));
    }

    #[test]
    fn test_wire_names() {
        let res = ResourceId::image("g1", "a.jpg").unwrap();
        let claims = Claims::new("iss", "aud", "sub", &res, read_scope(), Duration::from_secs(5), 10).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        for key in ["iss", "aud", "sub", "iat", "nbf", "exp", "jti", "gid", "scp", "img"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["scp"], serde_json::json!(["image:read"]));

        let unbound = Claims::new("iss", "aud", "sub", &ResourceId::gallery("g1").unwrap(), read_scope(), Duration::from_secs(5), 10).unwrap();
        let json = serde_json::to_value(&unbound).unwrap();
        assert!(json.get("img").is_none());
    }
}
