//! XA flags, return values and error codes.

use super::Error;

/// No flags set.
pub const XA_TMNOFLAGS: i32 = 0x00000000;

/// Caller is joining existing transaction branch.
pub const XA_TMJOIN: i32 = 0x00200000;

/// Caller is resuming association with suspended transaction branch.
pub const XA_TMRESUME: i32 = 0x08000000;

/// Dissociate caller from transaction branch - successful.
pub const XA_TMSUCCESS: i32 = 0x04000000;

/// Dissociate caller from transaction branch - failed.
pub const XA_TMFAIL: i32 = 0x20000000;

/// Caller is suspending (not ending) its association with transaction branch.
pub const XA_TMSUSPEND: i32 = 0x02000000;

/// Start a recovery scan.
pub const XA_TMSTARTRSCAN: i32 = 0x01000000;

/// End a recovery scan.
pub const XA_TMENDRSCAN: i32 = 0x00800000;

/// Normal execution.
pub const XA_OK: i32 = 0;

/// The transaction branch has been read-only and has been committed.
pub const XA_RDONLY: i32 = 3;

/// Resource manager error.
pub const XAER_RMERR: i32 = -3;

/// The XID is not valid.
pub const XAER_NOTA: i32 = -4;

/// Invalid arguments were given.
pub const XAER_INVAL: i32 = -5;

/// Routine invoked in an improper context.
pub const XAER_PROTO: i32 = -6;

/// Resource manager unavailable.
pub const XAER_RMFAIL: i32 = -7;

/// The XID already exists.
pub const XAER_DUPID: i32 = -8;

/// How `start` associates the connection with a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartFlags {
    /// New branch.
    #[default]
    NoFlags,
    /// Join a branch started elsewhere.
    Join,
    /// Resume a suspended branch.
    Resume,
}

impl TryFrom<i32> for StartFlags {
    type Error = Error;

    fn try_from(flags: i32) -> Result<Self, Self::Error> {
        match flags {
            XA_TMNOFLAGS => Ok(Self::NoFlags),
            XA_TMJOIN => Ok(Self::Join),
            XA_TMRESUME => Ok(Self::Resume),
            flags => Err(Error::Invalid(format!("start flags: {:#010x}", flags))),
        }
    }
}

impl From<StartFlags> for i32 {
    fn from(flags: StartFlags) -> i32 {
        match flags {
            StartFlags::NoFlags => XA_TMNOFLAGS,
            StartFlags::Join => XA_TMJOIN,
            StartFlags::Resume => XA_TMRESUME,
        }
    }
}

/// How `end` dissociates the connection from a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndFlags {
    #[default]
    Success,
    Fail,
    Suspend,
}

impl TryFrom<i32> for EndFlags {
    type Error = Error;

    fn try_from(flags: i32) -> Result<Self, Self::Error> {
        match flags {
            XA_TMSUCCESS => Ok(Self::Success),
            XA_TMFAIL => Ok(Self::Fail),
            XA_TMSUSPEND => Ok(Self::Suspend),
            flags => Err(Error::Invalid(format!("end flags: {:#010x}", flags))),
        }
    }
}

impl From<EndFlags> for i32 {
    fn from(flags: EndFlags) -> i32 {
        match flags {
            EndFlags::Success => XA_TMSUCCESS,
            EndFlags::Fail => XA_TMFAIL,
            EndFlags::Suspend => XA_TMSUSPEND,
        }
    }
}

/// Recovery scan flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverFlags(i32);

impl RecoverFlags {
    pub const NONE: Self = Self(XA_TMNOFLAGS);
    pub const START: Self = Self(XA_TMSTARTRSCAN);
    pub const END: Self = Self(XA_TMENDRSCAN);
    pub const START_END: Self = Self(XA_TMSTARTRSCAN | XA_TMENDRSCAN);

    pub fn start_scan(&self) -> bool {
        self.0 & XA_TMSTARTRSCAN != 0
    }

    pub fn end_scan(&self) -> bool {
        self.0 & XA_TMENDRSCAN != 0
    }
}

impl TryFrom<i32> for RecoverFlags {
    type Error = Error;

    fn try_from(flags: i32) -> Result<Self, Self::Error> {
        if flags & !(XA_TMSTARTRSCAN | XA_TMENDRSCAN) != 0 {
            return Err(Error::Invalid(format!("recover flags: {:#010x}", flags)));
        }

        Ok(Self(flags))
    }
}

/// Outcome of phase one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Branch can be committed.
    Ok,
    /// Branch did no writes and is already complete.
    ReadOnly,
}

impl Vote {
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => XA_OK,
            Self::ReadOnly => XA_RDONLY,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_start_flags() {
        assert_eq!(StartFlags::try_from(XA_TMNOFLAGS).unwrap(), StartFlags::NoFlags);
        assert_eq!(StartFlags::try_from(XA_TMJOIN).unwrap(), StartFlags::Join);
        assert_eq!(StartFlags::try_from(XA_TMRESUME).unwrap(), StartFlags::Resume);
        assert!(StartFlags::try_from(XA_TMSUSPEND).is_err());
        assert_eq!(i32::from(StartFlags::Join), XA_TMJOIN);
    }

    #[test]
    fn test_end_flags() {
        assert_eq!(EndFlags::try_from(XA_TMSUCCESS).unwrap(), EndFlags::Success);
        assert_eq!(EndFlags::try_from(XA_TMFAIL).unwrap(), EndFlags::Fail);
        assert_eq!(EndFlags::try_from(XA_TMSUSPEND).unwrap(), EndFlags::Suspend);

        let err = EndFlags::try_from(XA_TMJOIN).unwrap_err();
        assert_eq!(err.code(), XAER_INVAL);
    }

    #[test]
    fn test_recover_flags() {
        let flags = RecoverFlags::try_from(XA_TMSTARTRSCAN | XA_TMENDRSCAN).unwrap();
        assert!(flags.start_scan());
        assert!(flags.end_scan());
        assert_eq!(flags, RecoverFlags::START_END);
        assert!(!RecoverFlags::NONE.start_scan());
        assert!(RecoverFlags::try_from(XA_TMJOIN).is_err());
    }

    #[test]
    fn test_vote() {
        assert_eq!(Vote::Ok.code(), XA_OK);
        assert_eq!(Vote::ReadOnly.code(), XA_RDONLY);
    }
}
