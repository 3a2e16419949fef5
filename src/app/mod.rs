use std::fmt;
use std::fs;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::page::Page;
use chrono::Utc;
use clap::{ArgAction, Parser, ValueEnum};
use crossterm::style::Stylize;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

include!("types.rs");
include!("timer.rs");
include!("report.rs");
include!("driver.rs");
include!("webdriver.rs");
include!("cdp.rs");
include!("gateway.rs");
include!("crawl.rs");
include!("runtime.rs");
