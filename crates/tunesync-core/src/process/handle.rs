#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

use crate::error::{Error, Result};

#[cfg(target_os = "windows")]
use std::ffi::OsString;
#[cfg(target_os = "windows")]
use std::os::windows::ffi::OsStringExt;
#[cfg(target_os = "windows")]
use tracing::{debug, warn};
#[cfg(target_os = "windows")]
use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE, HMODULE, HWND, LPARAM};
#[cfg(target_os = "windows")]
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::ProcessStatus::{
    EnumProcessModulesEx, GetModuleBaseNameW, LIST_MODULES_ALL,
};
#[cfg(target_os = "windows")]
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
#[cfg(target_os = "windows")]
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    IsWindowVisible,
};
#[cfg(target_os = "windows")]
use windows::core::{HSTRING, PCWSTR};

#[cfg(not(target_os = "windows"))]
const UNSUPPORTED: &str = "Windows only: process access not supported on this platform";

/// An open, read-only handle to another process.
///
/// The handle is acquired once and closed on drop.
#[cfg(target_os = "windows")]
pub struct ProcessHandle {
    handle: HANDLE,
    pid: u32,
}

#[cfg(not(target_os = "windows"))]
pub struct ProcessHandle {
    pid: u32,
}

// SAFETY: a process HANDLE is a kernel object reference that may be used from any thread.
// ProcessHandle never hands out mutable access to it and closes it exactly once in Drop.
#[cfg(target_os = "windows")]
unsafe impl Send for ProcessHandle {}
#[cfg(target_os = "windows")]
unsafe impl Sync for ProcessHandle {}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle").field("pid", &self.pid).finish()
    }
}

#[cfg(target_os = "windows")]
impl ProcessHandle {
    pub fn open(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess is called with read-only access flags and a plain PID.
        // The returned handle is owned by this struct and closed in Drop.
        let handle = unsafe {
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid).map_err(|e| {
                debug!("OpenProcess failed for PID {}: {}", pid, e);
                Error::remote(0, format!("OpenProcess failed for PID {}: {}", pid, e))
            })?
        };
        Ok(Self { handle, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn raw(&self) -> HANDLE {
        self.handle
    }

    /// Base address of the loaded module called `name` (case-insensitive).
    pub fn module_base(&self, name: &str) -> Result<u64> {
        let mut modules = [HMODULE::default(); 1024];
        let mut needed: u32 = 0;

        // SAFETY: the handle was opened with PROCESS_QUERY_INFORMATION | PROCESS_VM_READ and
        // the output buffer size passed matches the array in bytes.
        unsafe {
            EnumProcessModulesEx(
                self.handle,
                modules.as_mut_ptr(),
                std::mem::size_of_val(&modules) as u32,
                &mut needed,
                LIST_MODULES_ALL,
            )
            .map_err(|e| Error::remote(0, format!("Failed to enumerate modules: {}", e)))?;
        }

        let count = (needed as usize / std::mem::size_of::<HMODULE>()).min(modules.len());
        let mut name_buf = [0u16; 260];
        for module in &modules[..count] {
            // SAFETY: module comes from EnumProcessModulesEx for this handle and name_buf is a
            // writable slice; the call returns the number of UTF-16 units written.
            let len = unsafe { GetModuleBaseNameW(self.handle, *module, &mut name_buf) } as usize;
            if len == 0 {
                continue;
            }
            let module_name = OsString::from_wide(&name_buf[..len]);
            if module_name.to_string_lossy().eq_ignore_ascii_case(name) {
                return Ok(module.0 as u64);
            }
        }

        Err(Error::TargetNotFound(format!(
            "Module '{}' not loaded in PID {}",
            name, self.pid
        )))
    }
}

#[cfg(not(target_os = "windows"))]
impl ProcessHandle {
    pub fn open(_pid: u32) -> Result<Self> {
        Err(Error::TargetNotFound(UNSUPPORTED.to_string()))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn module_base(&self, _name: &str) -> Result<u64> {
        Err(Error::TargetNotFound(UNSUPPORTED.to_string()))
    }
}

#[cfg(target_os = "windows")]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.handle.is_invalid() {
            // SAFETY: self.handle came from OpenProcess and has not been closed yet.
            if let Err(e) = unsafe { CloseHandle(self.handle) } {
                warn!("Failed to close process handle: {}", e);
            }
        }
    }
}

/// Find the PID of a running process by executable name (case-insensitive).
#[cfg(target_os = "windows")]
pub fn find_process_id(name: &str) -> Result<u32> {
    // SAFETY: CreateToolhelp32Snapshot with TH32CS_SNAPPROCESS takes no pointers.
    // The snapshot handle is closed before returning.
    let snapshot = unsafe {
        CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
            .map_err(|e| Error::TargetNotFound(e.to_string()))?
    };

    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    // SAFETY: the snapshot handle is valid and entry.dwSize is initialised as the API requires.
    let mut found = None;
    unsafe {
        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let end = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe_name = OsString::from_wide(&entry.szExeFile[..end]);
                if exe_name.to_string_lossy().eq_ignore_ascii_case(name) {
                    found = Some(entry.th32ProcessID);
                    break;
                }
                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);
    }

    found.ok_or_else(|| Error::TargetNotFound(format!("Process '{}' not found", name)))
}

#[cfg(not(target_os = "windows"))]
pub fn find_process_id(_name: &str) -> Result<u32> {
    Err(Error::TargetNotFound(UNSUPPORTED.to_string()))
}

/// PID owning the first top-level window of the given class.
#[cfg(target_os = "windows")]
pub fn find_window_pid(class_name: &str) -> Option<u32> {
    let class = HSTRING::from(class_name);
    // SAFETY: both arguments are valid (or null) wide strings that outlive the call.
    let hwnd = unsafe { FindWindowW(&class, PCWSTR::null()) }.ok()?;
    if hwnd.is_invalid() {
        return None;
    }
    let mut pid = 0u32;
    // SAFETY: hwnd was just returned by FindWindowW and pid is a valid out pointer.
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    (pid != 0).then_some(pid)
}

#[cfg(not(target_os = "windows"))]
pub fn find_window_pid(_class_name: &str) -> Option<u32> {
    None
}

#[cfg(target_os = "windows")]
struct TitleSearch {
    pid: u32,
    title: Option<String>,
}

/// Title of the first visible, titled top-level window owned by `pid`.
#[cfg(target_os = "windows")]
pub fn main_window_title(pid: u32) -> Option<String> {
    let mut search = TitleSearch { pid, title: None };
    // SAFETY: the LPARAM points at `search`, which outlives the synchronous enumeration.
    // EnumWindows reports an error when the callback stops early, which is expected here.
    unsafe {
        let _ = EnumWindows(
            Some(collect_title),
            LPARAM(&mut search as *mut TitleSearch as isize),
        );
    }
    search.title
}

#[cfg(target_os = "windows")]
unsafe extern "system" fn collect_title(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the &mut TitleSearch handed to EnumWindows above.
    let search = unsafe { &mut *(lparam.0 as *mut TitleSearch) };

    let mut window_pid = 0u32;
    // SAFETY: hwnd is supplied by EnumWindows and valid for the callback's duration.
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut window_pid)) };
    if window_pid != search.pid || !unsafe { IsWindowVisible(hwnd) }.as_bool() {
        return BOOL(1);
    }

    // SAFETY: same hwnd as above; the buffer is sized from GetWindowTextLengthW plus the NUL.
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return BOOL(1);
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    if copied <= 0 {
        return BOOL(1);
    }

    search.title = Some(String::from_utf16_lossy(&buf[..copied as usize]));
    BOOL(0)
}

#[cfg(not(target_os = "windows"))]
pub fn main_window_title(_pid: u32) -> Option<String> {
    None
}
