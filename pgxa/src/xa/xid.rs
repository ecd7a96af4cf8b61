//! Transaction branch identifier.

use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

use super::Error;

/// XA transaction identifier.
///
/// Two identifiers are equal when their format id and the
/// bytes of both id fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    /// Maximum length for global transaction ID.
    pub const MAXGTRIDSIZE: usize = 64;
    /// Maximum length for branch qualifier.
    pub const MAXBQUALSIZE: usize = 64;

    /// Create a new transaction identifier.
    ///
    /// Both id fields must be non-empty and fit their maximum size.
    pub fn new(
        format_id: i32,
        global_transaction_id: &[u8],
        branch_qualifier: &[u8],
    ) -> Result<Self, Error> {
        if global_transaction_id.is_empty() || global_transaction_id.len() > Self::MAXGTRIDSIZE {
            return Err(Error::Invalid(format!(
                "global transaction id must be 1 to {} bytes, got {}",
                Self::MAXGTRIDSIZE,
                global_transaction_id.len()
            )));
        }

        if branch_qualifier.is_empty() || branch_qualifier.len() > Self::MAXBQUALSIZE {
            return Err(Error::Invalid(format!(
                "branch qualifier must be 1 to {} bytes, got {}",
                Self::MAXBQUALSIZE,
                branch_qualifier.len()
            )));
        }

        Ok(Self {
            format_id,
            global_transaction_id: global_transaction_id.to_vec(),
            branch_qualifier: branch_qualifier.to_vec(),
        })
    }

    /// Generate a random identifier.
    pub fn generate() -> Self {
        Self {
            format_id: 0,
            global_transaction_id: Uuid::new_v4().as_bytes().to_vec(),
            branch_qualifier: vec![0u8; 8],
        }
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }

    /// Name of the prepared transaction on the server.
    pub fn to_gid(&self) -> String {
        format!(
            "{}_{}_{}",
            self.format_id,
            STANDARD.encode(&self.global_transaction_id),
            STANDARD.encode(&self.branch_qualifier)
        )
    }

    /// Parse a prepared transaction name. Returns `None`
    /// if the transaction wasn't prepared by us.
    pub fn from_gid(gid: &str) -> Option<Self> {
        let mut parts = gid.split('_');
        let format_id = parts.next()?.parse::<i32>().ok()?;
        let gtrid = STANDARD.decode(parts.next()?).ok()?;
        let bqual = STANDARD.decode(parts.next()?).ok()?;

        if parts.next().is_some() {
            return None;
        }

        Self::new(format_id, &gtrid, &bqual).ok()
    }
}

impl std::fmt::Display for Xid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_gid())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_equality_by_content() {
        let a = Xid::new(1, b"global", b"branch").unwrap();
        let b = Xid::new(1, &b"global".to_vec(), &b"branch".to_vec()).unwrap();
        assert_eq!(a, b);

        assert_ne!(a, Xid::new(2, b"global", b"branch").unwrap());
        assert_ne!(a, Xid::new(1, b"global", b"other").unwrap());
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(Xid::new(0, b"", b"b"), Err(Error::Invalid(_))));
        assert!(matches!(Xid::new(0, b"g", b""), Err(Error::Invalid(_))));
        assert!(matches!(
            Xid::new(0, &[1u8; Xid::MAXGTRIDSIZE + 1], b"b"),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            Xid::new(0, b"g", &[1u8; Xid::MAXBQUALSIZE + 1]),
            Err(Error::Invalid(_))
        ));
        assert!(Xid::new(0, &[1u8; Xid::MAXGTRIDSIZE], &[2u8; Xid::MAXBQUALSIZE]).is_ok());
    }

    #[test]
    fn test_gid() {
        let xid = Xid::new(4660, b"\x00\xffglobal", b"branch").unwrap();
        let gid = xid.to_gid();
        assert!(gid.starts_with("4660_"));
        assert_eq!(Xid::from_gid(&gid), Some(xid));

        let negative = Xid::new(-1, b"g", b"b").unwrap();
        assert_eq!(Xid::from_gid(&negative.to_gid()), Some(negative));
    }

    #[test]
    fn test_foreign_gid() {
        assert_eq!(Xid::from_gid("__pgdog_2pc_12"), None);
        assert_eq!(Xid::from_gid("my transaction"), None);
        assert_eq!(Xid::from_gid("1_Zw==_Yg==_extra"), None);
        assert_eq!(Xid::from_gid("1__Yg=="), None);
    }

    #[test]
    fn test_generate() {
        let a = Xid::generate();
        let b = Xid::generate();
        assert_ne!(a, b);
        assert_eq!(a.global_transaction_id().len(), 16);
    }
}
