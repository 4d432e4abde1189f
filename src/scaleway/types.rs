//! Newtypes for Scaleway lifecycle values to avoid stringly-typed code.

use std::ops::Deref;

use crate::backend::HealthStatus;

macro_rules! newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub(crate) struct $name(String);

        impl $name {
            pub(crate) const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }
    };
}

newtype!(InstanceState);
newtype!(Action);

impl InstanceState {
    /// Returns `true` once the server has booted.
    pub(crate) fn is_running(&self) -> bool {
        self.as_str() == "running"
    }

    /// Maps the server state onto the instance health signal. `locked`
    /// servers are held by Scaleway and never recover on their own.
    pub(crate) fn health(&self) -> HealthStatus {
        match self.as_str() {
            "running" => HealthStatus::Ok,
            "locked" => HealthStatus::Failed,
            _ => HealthStatus::Initializing,
        }
    }
}
