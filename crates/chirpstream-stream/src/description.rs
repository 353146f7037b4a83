//! What to subscribe to: stream kinds, parameters and endpoint routing.
//!
//! A [`StreamDescription`] is immutable and validated once, when built.
//!
//! | kind     | allowed parameters                                  | required        |
//! |----------|-----------------------------------------------------|-----------------|
//! | firehose | delimited, count                                    |                 |
//! | sample   | delimited, count                                    |                 |
//! | filter   | delimited, count, follow, track, locations          | follow or track |
//! | links    | delimited, count                                    |                 |
//! | retweet  | delimited                                           |                 |
//! | user     | delimited, count, track, locations, replies, with   |                 |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use chirpstream_core::oauth::HttpMethod;

use crate::config::StreamEndpoints;
use crate::error::DescriptionError;

/// Longest track keyword the platform accepts, in bytes.
pub const MAX_KEYWORD_BYTES: usize = 60;

/// The streaming endpoints offered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Firehose,
    Sample,
    Filter,
    Links,
    Retweet,
    User,
}

impl StreamKind {
    pub const ALL: [StreamKind; 6] = [
        Self::Firehose,
        Self::Sample,
        Self::Filter,
        Self::Links,
        Self::Retweet,
        Self::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firehose => "firehose",
            Self::Sample => "sample",
            Self::Filter => "filter",
            Self::Links => "links",
            Self::Retweet => "retweet",
            Self::User => "user",
        }
    }

    /// `filter` is POSTed; everything else is a GET.
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Filter => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    pub fn allows(&self, parameter: Parameter) -> bool {
        use Parameter::*;
        match self {
            Self::Firehose | Self::Sample | Self::Links => matches!(parameter, Delimited | Count),
            Self::Filter => matches!(parameter, Delimited | Count | Follow | Track | Locations),
            Self::Retweet => matches!(parameter, Delimited),
            Self::User => !matches!(parameter, Follow),
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DescriptionError::UnknownKind(s.to_string()))
    }
}

/// Subscription parameters, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Delimited,
    Count,
    Follow,
    Track,
    Locations,
    Replies,
    With,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Count => "count",
            Self::Follow => "follow",
            Self::Track => "track",
            Self::Locations => "locations",
            Self::Replies => "replies",
            Self::With => "with",
        }
    }
}

/// A longitude/latitude rectangle, south-west corner first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub sw_lon: f64,
    pub sw_lat: f64,
    pub ne_lon: f64,
    pub ne_lat: f64,
}

impl BoundingBox {
    pub fn new(sw_lon: f64, sw_lat: f64, ne_lon: f64, ne_lat: f64) -> Self {
        Self { sw_lon, sw_lat, ne_lon, ne_lat }
    }

    pub fn validate(&self) -> Result<(), DescriptionError> {
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        if !(lon_ok(self.sw_lon) && lon_ok(self.ne_lon)) {
            return Err(DescriptionError::InvalidLocation(format!(
                "longitude out of range in {self}"
            )));
        }
        if !(lat_ok(self.sw_lat) && lat_ok(self.ne_lat)) {
            return Err(DescriptionError::InvalidLocation(format!(
                "latitude out of range in {self}"
            )));
        }
        if self.sw_lon >= self.ne_lon || self.sw_lat >= self.ne_lat {
            return Err(DescriptionError::InvalidLocation(format!(
                "south-west corner must lie below and left of north-east in {self}"
            )));
        }
        Ok(())
    }

    /// Parse `swLon,swLat,neLon,neLat[,swLon,...]` into boxes.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, DescriptionError> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    DescriptionError::InvalidLocation(format!("{part:?} is not a coordinate"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() || values.len() % 4 != 0 {
            return Err(DescriptionError::InvalidLocation(format!(
                "expected groups of four coordinates, got {}",
                values.len()
            )));
        }
        Ok(values
            .chunks_exact(4)
            .map(|c| Self::new(c[0], c[1], c[2], c[3]))
            .collect())
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.sw_lon, self.sw_lat, self.ne_lon, self.ne_lat)
    }
}

/// An immutable, validated subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescription {
    kind: StreamKind,
    delimited: bool,
    count: Option<i32>,
    follow: Vec<i64>,
    track: Vec<String>,
    locations: Vec<BoundingBox>,
    replies_all: bool,
    with: Option<String>,
}

impl StreamDescription {
    pub fn builder(kind: StreamKind) -> StreamDescriptionBuilder {
        StreamDescriptionBuilder {
            inner: Self {
                kind,
                delimited: false,
                count: None,
                follow: Vec::new(),
                track: Vec::new(),
                locations: Vec::new(),
                replies_all: false,
                with: None,
            },
        }
    }

    /// A description with no parameters. Fails for `filter`, which needs a
    /// predicate.
    pub fn new(kind: StreamKind) -> Result<Self, DescriptionError> {
        Self::builder(kind).build()
    }

    /// `filter` tracking `keywords`.
    pub fn track<I, S>(keywords: I) -> Result<Self, DescriptionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(StreamKind::Filter).track(keywords).build()
    }

    /// `filter` following `ids`.
    pub fn follow(ids: impl IntoIterator<Item = i64>) -> Result<Self, DescriptionError> {
        Self::builder(StreamKind::Filter).follow(ids).build()
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn is_delimited(&self) -> bool {
        self.delimited
    }

    pub fn count(&self) -> Option<i32> {
        self.count
    }

    pub fn follow_ids(&self) -> &[i64] {
        &self.follow
    }

    pub fn keywords(&self) -> &[String] {
        &self.track
    }

    pub fn locations(&self) -> &[BoundingBox] {
        &self.locations
    }

    pub fn replies_all(&self) -> bool {
        self.replies_all
    }

    pub fn with_modifier(&self) -> Option<&str> {
        self.with.as_deref()
    }

    pub fn method(&self) -> HttpMethod {
        self.kind.method()
    }

    /// The URL this description connects to.
    pub fn endpoint(&self, endpoints: &StreamEndpoints) -> String {
        match self.kind {
            StreamKind::User => endpoints.user_stream.clone(),
            kind => format!(
                "{}/{}.json",
                endpoints.public_base.trim_end_matches('/'),
                kind.as_str()
            ),
        }
    }

    /// Request parameters in wire form, unsigned.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |p: Parameter, value: String| params.push((p.as_str().to_string(), value));
        if self.delimited {
            push(Parameter::Delimited, "length".into());
        }
        if let Some(count) = self.count {
            push(Parameter::Count, count.to_string());
        }
        if !self.follow.is_empty() {
            let ids: Vec<String> = self.follow.iter().map(i64::to_string).collect();
            push(Parameter::Follow, ids.join(","));
        }
        if !self.track.is_empty() {
            push(Parameter::Track, self.track.join(","));
        }
        if !self.locations.is_empty() {
            let boxes: Vec<String> = self.locations.iter().map(ToString::to_string).collect();
            push(Parameter::Locations, boxes.join(","));
        }
        if self.replies_all {
            push(Parameter::Replies, "all".into());
        }
        if let Some(with) = &self.with {
            push(Parameter::With, with.clone());
        }
        params
    }

    fn parameters_set(&self) -> Vec<Parameter> {
        let flags = [
            (Parameter::Delimited, self.delimited),
            (Parameter::Count, self.count.is_some()),
            (Parameter::Follow, !self.follow.is_empty()),
            (Parameter::Track, !self.track.is_empty()),
            (Parameter::Locations, !self.locations.is_empty()),
            (Parameter::Replies, self.replies_all),
            (Parameter::With, self.with.is_some()),
        ];
        flags.into_iter().filter(|(_, set)| *set).map(|(p, _)| p).collect()
    }

    fn validate(&self) -> Result<(), DescriptionError> {
        if let Some(parameter) = self.parameters_set().into_iter().find(|p| !self.kind.allows(*p)) {
            return Err(DescriptionError::ForbiddenParameter {
                kind: self.kind,
                parameter: parameter.as_str(),
            });
        }
        if self.kind == StreamKind::Filter && self.follow.is_empty() && self.track.is_empty() {
            return Err(DescriptionError::MissingFilterPredicate);
        }
        for bbox in &self.locations {
            bbox.validate()?;
        }
        for keyword in &self.track {
            if keyword.trim().is_empty() {
                return Err(DescriptionError::InvalidKeyword {
                    keyword: keyword.clone(),
                    reason: "blank",
                });
            }
            if keyword.len() > MAX_KEYWORD_BYTES {
                return Err(DescriptionError::InvalidKeyword {
                    keyword: keyword.clone(),
                    reason: "longer than 60 bytes",
                });
            }
        }
        if let Some(with) = &self.with {
            if with.trim().is_empty() {
                return Err(DescriptionError::InvalidModifier(with.clone()));
            }
        }
        Ok(())
    }
}

/// Builder for [`StreamDescription`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct StreamDescriptionBuilder {
    inner: StreamDescription,
}

impl StreamDescriptionBuilder {
    /// Ask for `delimited=length` framing. The server only offers byte
    /// length prefixes, so this is a flag rather than a numeric hint.
    pub fn delimited(mut self) -> Self {
        self.inner.delimited = true;
        self
    }

    /// Backfill count; negative values count from the oldest.
    pub fn count(mut self, count: i32) -> Self {
        self.inner.count = Some(count);
        self
    }

    pub fn follow(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.inner.follow.extend(ids);
        self
    }

    pub fn track<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.track.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn locations(mut self, boxes: impl IntoIterator<Item = BoundingBox>) -> Self {
        self.inner.locations.extend(boxes);
        self
    }

    /// `replies=all`.
    pub fn replies_all(mut self) -> Self {
        self.inner.replies_all = true;
        self
    }

    /// `with=<modifier>`, e.g. `followings` or `user`.
    pub fn with(mut self, modifier: impl Into<String>) -> Self {
        self.inner.with = Some(modifier.into());
        self
    }

    pub fn build(self) -> Result<StreamDescription, DescriptionError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
