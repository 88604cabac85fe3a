// src/endpoint.rs
//! Pseudo-terminal endpoint exposed to gpsd through a fixed symlink

use crate::error::{BridgeError, Result};
use nix::{
    fcntl::{fcntl, FcntlArg, OFlag},
    pty::openpty,
    unistd::{chown, ttyname, Gid, Group, Uid},
};
use std::{
    fs::{self, File, Permissions},
    io::{self, Write},
    os::{
        fd::AsRawFd,
        unix::fs::{symlink, PermissionsExt},
    },
    path::{Path, PathBuf},
};

/// rw-rw---- on the consumer-side device
pub const CONSUMER_MODE: u32 = 0o660;

/// Owner applied to the consumer-side device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: Uid,
    pub gid: Gid,
}

impl Owner {
    /// root:`group`. gpsd drops privileges to a user in that group.
    pub fn root_with_group(group: &str) -> Result<Self> {
        let entry = Group::from_name(group)
            .map_err(|e| BridgeError::Group(format!("{}: {}", group, e)))?
            .ok_or_else(|| BridgeError::Group(format!("{}: no such group", group)))?;

        Ok(Self {
            uid: Uid::from_raw(0),
            gid: entry.gid,
        })
    }

    /// The calling process's own uid and gid
    pub fn current() -> Self {
        Self {
            uid: Uid::current(),
            gid: Gid::current(),
        }
    }
}

/// Controller side of a pty pair plus the alias pointing at its consumer side.
///
/// The consumer-side descriptor is closed as soon as its name is known; gpsd
/// opens the device by path. Dropping the endpoint releases it.
#[derive(Debug)]
pub struct Endpoint {
    master: Option<File>,
    device: PathBuf,
    alias: PathBuf,
}

impl Endpoint {
    /// Create the pty pair and publish `alias` -> consumer device
    pub fn acquire(alias: impl Into<PathBuf>, owner: Owner) -> Result<Self> {
        let alias = alias.into();

        let pty = openpty(None, None)?;
        let device = ttyname(&pty.slave)?;
        drop(pty.slave);

        let master = File::from(pty.master);
        set_nonblocking(&master)?;

        // Drop cleans up from here on if anything below fails
        let endpoint = Self {
            master: Some(master),
            device,
            alias,
        };

        chown(&endpoint.device, Some(owner.uid), Some(owner.gid))?;
        fs::set_permissions(&endpoint.device, Permissions::from_mode(CONSUMER_MODE))?;
        endpoint.publish_alias()?;

        tracing::info!(
            "PTY slave: {}  →  {}",
            endpoint.device.display(),
            endpoint.alias.display()
        );
        Ok(endpoint)
    }

    /// Consumer-side device name, e.g. `/dev/pts/3`
    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn alias(&self) -> &Path {
        &self.alias
    }

    pub fn is_open(&self) -> bool {
        self.master.is_some()
    }

    /// Remove the alias and close the controller side. Only the first call
    /// does anything.
    pub fn release(&mut self) {
        let Some(master) = self.master.take() else {
            return;
        };

        if is_symlink(&self.alias) {
            if let Err(e) = fs::remove_file(&self.alias) {
                tracing::warn!(alias = %self.alias.display(), error = %e, "could not remove alias");
            }
        }

        drop(master);
        tracing::debug!(device = %self.device.display(), "pty closed");
    }

    fn publish_alias(&self) -> Result<()> {
        match fs::symlink_metadata(&self.alias) {
            Ok(_) => fs::remove_file(&self.alias).map_err(|e| self.alias_error(e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.alias_error(e)),
        }

        symlink(&self.device, &self.alias).map_err(|e| self.alias_error(e))
    }

    fn alias_error(&self, source: io::Error) -> BridgeError {
        BridgeError::Alias {
            path: self.alias.clone(),
            source,
        }
    }
}

impl Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.master.as_mut() {
            Some(master) => master.write(buf),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "pty already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.master.as_mut() {
            Some(master) => master.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// A consumer that stops reading must not stall the event loop; a full pty
/// buffer shows up as `WouldBlock` instead.
fn set_nonblocking(file: &File) -> Result<()> {
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}
