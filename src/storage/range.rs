use crate::error::RangeError;

/// Inclusive byte interval `[start, end]` within an object of `total` bytes.
///
/// Always satisfies `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Whole-object range, or `None` for an empty object.
    pub fn whole(total: u64) -> Option<Self> {
        (total > 0).then(|| Self {
            start: 0,
            end: total - 1,
            total,
        })
    }

    /// Parse a `Range` header value against an object of `total` bytes.
    ///
    /// Accepts a single `bytes=<start>-<end>`. An empty start means from the
    /// first byte, an empty end means through the last byte.
    pub fn parse(value: &str, total: u64) -> Result<Self, RangeError> {
        let malformed = || RangeError::Malformed(value.to_string());

        let rest = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
        if rest.contains(',') {
            return Err(malformed());
        }
        let (start_str, end_str) = rest.split_once('-').ok_or_else(malformed)?;
        let (start_str, end_str) = (start_str.trim(), end_str.trim());
        if start_str.is_empty() && end_str.is_empty() {
            return Err(malformed());
        }

        let start = if start_str.is_empty() {
            0
        } else {
            parse_bound(start_str).ok_or_else(malformed)?
        };
        let end = if end_str.is_empty() {
            None
        } else {
            Some(parse_bound(end_str).ok_or_else(malformed)?)
        };

        if total == 0 {
            return Err(RangeError::Unsatisfiable { total });
        }
        let end = end.unwrap_or(total - 1);
        if start > end || end >= total {
            return Err(RangeError::Unsatisfiable { total });
        }

        Ok(Self { start, end, total })
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether this range is the entire object.
    pub fn is_whole(&self) -> bool {
        self.start == 0 && self.end + 1 == self.total
    }

    /// `Content-Range` header value, e.g. `bytes 0-99/1000`.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

fn parse_bound(s: &str) -> Option<u64> {
    // u64::from_str accepts a leading '+', which is not valid here.
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_full() {
        let r = ByteRange::parse("bytes=0-99", 1000).unwrap();
        assert_eq!((r.start, r.end, r.total), (0, 99, 1000));
        assert_eq!(r.len(), 100);
        assert_eq!(r.content_range(), "bytes 0-99/1000");
    }

    #[test]
    fn test_parse_range_open_ended() {
        let r = ByteRange::parse("bytes=500-", 1000).unwrap();
        assert_eq!((r.start, r.end), (500, 999));
    }

    #[test]
    fn test_parse_range_empty_start_reads_from_first_byte() {
        let r = ByteRange::parse("bytes=-99", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 99));
    }

    #[test]
    fn test_parse_range_whole_via_header() {
        let r = ByteRange::parse(" bytes=0-999 ", 1000).unwrap();
        assert!(r.is_whole());
    }

    #[test]
    fn test_parse_range_malformed() {
        for bad in [
            "invalid",
            "bytes=abc-def",
            "bytes=-",
            "bytes=5",
            "bytes=0-1,4-5",
            "items=0-1",
            "bytes=+1-2",
            "bytes=-1-2",
        ] {
            assert!(
                matches!(ByteRange::parse(bad, 1000), Err(RangeError::Malformed(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        for bad in ["bytes=1000-", "bytes=10-5", "bytes=0-1000", "bytes=999-1000"] {
            assert_eq!(
                ByteRange::parse(bad, 1000),
                Err(RangeError::Unsatisfiable { total: 1000 }),
                "{:?}",
                bad
            );
        }
        assert_eq!(
            ByteRange::parse("bytes=0-0", 0),
            Err(RangeError::Unsatisfiable { total: 0 })
        );
    }

    #[test]
    fn test_whole() {
        assert_eq!(ByteRange::whole(0), None);
        let r = ByteRange::whole(500).unwrap();
        assert_eq!((r.start, r.end, r.len()), (0, 499, 500));
    }
}
