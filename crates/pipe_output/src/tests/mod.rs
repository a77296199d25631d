use super::*;
use std::fs as std_fs;
use std::time::Duration;
use tokio::sync::mpsc;

mod support;
use support::*;
