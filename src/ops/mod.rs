//! Operations shared by the command line and the plan runner. Each takes a
//! typed parameter record and a [`Transport`](crate::api::Transport).

pub(crate) mod cloud_server;
pub(crate) mod ssh;
