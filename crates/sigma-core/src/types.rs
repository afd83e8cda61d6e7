//! Resource state machines.
//!
//! Canonical status enumerations for servers, drives and jobs together with
//! the transitions the service performs. Status strings the client does not
//! know about are preserved verbatim in an `Other` variant, because the
//! service occasionally reports variants such as `running_legacy`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Progress value a job reports once it has finished.
pub const JOB_PROGRESS_COMPLETE: u8 = 100;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Status string not known to this client.
            Other(String),
        }

        impl $name {
            /// Returns the wire representation.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $($text => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl From<$name> for String {
            fn from(status: $name) -> Self {
                status.as_str().to_string()
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum! {
    /// Lifecycle status of a server instance.
    ServerStatus {
        /// Server is powered off.
        Stopped => "stopped",
        /// Start accepted, guest booting.
        Starting => "starting",
        /// Guest is running.
        Running => "running",
        /// Stop accepted, guest shutting down.
        Stopping => "stopping",
        /// Host is unreachable.
        Unavailable => "unavailable",
    }
}

impl ServerStatus {
    /// True for `stopped` and its variants (the backend gates Start on this prefix).
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.as_str().starts_with("stopped")
    }

    /// True for `running` and its variants (the backend gates Stop on this prefix).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.as_str().starts_with("running")
    }

    /// Whether the service moves a server from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match (self, next) {
            (_, Self::Unavailable) => true,
            (Self::Unavailable, Self::Stopped | Self::Running) => true,
            (from, Self::Starting) => from.is_stopped(),
            (Self::Starting, Self::Running) => true,
            (from, Self::Stopping) => from.is_running(),
            (Self::Stopping, Self::Stopped) => true,
            _ => false,
        }
    }

    /// The status an accepted action settles on.
    #[must_use]
    pub const fn settled(&self) -> Option<Self> {
        match self {
            Self::Starting => Some(Self::Running),
            Self::Stopping => Some(Self::Stopped),
            _ => None,
        }
    }
}

status_enum! {
    /// Lifecycle status of a drive.
    DriveStatus {
        /// Drive is not attached to a running server.
        Unmounted => "unmounted",
        /// Drive is attached to a running server.
        Mounted => "mounted",
        /// Drive is being created.
        Creating => "creating",
        /// Drive is being resized.
        Resizing => "resizing",
        /// Drive is the target of a clone in progress.
        CloningDst => "cloning_dst",
        /// Drive is the source of a clone in progress.
        CloningSrc => "cloning_src",
        /// Drive storage is unreachable.
        Unavailable => "unavailable",
    }
}

impl DriveStatus {
    /// Whether the service moves a drive from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Unavailable)
                | (Self::Unavailable, Self::Unmounted)
                | (Self::Creating, Self::Unmounted)
                | (Self::Unmounted, Self::Mounted | Self::Resizing | Self::CloningSrc)
                | (Self::Mounted, Self::Unmounted)
                | (Self::Resizing | Self::CloningDst | Self::CloningSrc, Self::Unmounted)
        )
    }

    /// True while the drive is busy with an asynchronous operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Resizing | Self::CloningDst | Self::CloningSrc
        )
    }
}

status_enum! {
    /// Execution state of a job.
    JobState {
        /// Job has been accepted and is in progress.
        Started => "started",
        /// Job finished.
        Success => "success",
    }
}

impl JobState {
    /// Jobs only move forward from `started` to `success`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!((self, next), (Self::Started, Self::Success))
    }

    /// True once the job has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Drive media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    /// Block device disk.
    Disk,
    /// CD-ROM image.
    Cdrom,
}

impl Media {
    /// Returns the media type as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Cdrom => "cdrom",
        }
    }
}

impl FromStr for Media {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disk" => Ok(Self::Disk),
            "cdrom" => Ok(Self::Cdrom),
            _ => Err(Error::Precondition(format!("unknown media type: {s}"))),
        }
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which attached drives are removed together with a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Recurse {
    /// Keep all drives.
    #[default]
    Nothing,
    /// Remove every attached drive.
    AllDrives,
    /// Remove attached disks only.
    Disks,
    /// Remove attached CD-ROMs only.
    Cdroms,
}

impl Recurse {
    /// Value of the `recurse` query parameter, if any.
    #[must_use]
    pub const fn as_query(&self) -> Option<&'static str> {
        match self {
            Self::Nothing => None,
            Self::AllDrives => Some("all_drives"),
            Self::Disks => Some("disks"),
            Self::Cdroms => Some("cdroms"),
        }
    }
}
