use bitflags::bitflags;

bitflags! {
    /// Flags accepted by `open`. Only `O_CREAT` changes behavior; the rest
    /// are carried for callers that pass them through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlag: u32 {
        const O_RDONLY   = 1 << 0;
        const O_WRONLY   = 1 << 1;
        const O_RDWR     = 1 << 2;
        const O_NONBLOCK = 1 << 3;
        const O_APPEND   = 1 << 4;
        const O_CREAT    = 1 << 5;
        const O_TRUNC    = 1 << 6;
        const O_EXCL     = 1 << 7;
        const O_SHLOCK   = 1 << 8;
        const O_EXLOCK   = 1 << 9;
        const O_NOFOLLOW = 1 << 10;
        const O_SYMLINK  = 1 << 11;
        const O_EVTONLY  = 1 << 12;
        const O_CLOEXEC  = 1 << 13;
    }
}

bitflags! {
    /// Permission bits for one of owner, group or other.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileMode: u8 {
        const M_EXEC  = 1 << 0;
        const M_WRITE = 1 << 1;
        const M_READ  = 1 << 2;
    }
}

/// Owner, group and other permissions. Stored on inodes, never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode {
    pub owner: FileMode,
    pub group: FileMode,
    pub other: FileMode,
}

impl Mode {
    pub fn new(owner: FileMode, group: FileMode, other: FileMode) -> Self {
        Self { owner, group, other }
    }

    /// rwx for the owner, read-only for everyone else
    pub fn user() -> Self {
        Self::new(
            FileMode::M_READ | FileMode::M_WRITE | FileMode::M_EXEC,
            FileMode::M_READ,
            FileMode::M_READ,
        )
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::user()
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bits in [self.owner, self.group, self.other] {
            let r = if bits.contains(FileMode::M_READ) { 'r' } else { '-' };
            let w = if bits.contains(FileMode::M_WRITE) { 'w' } else { '-' };
            let x = if bits.contains(FileMode::M_EXEC) { 'x' } else { '-' };
            write!(f, "{r}{w}{x}")?;
        }
        Ok(())
    }
}
