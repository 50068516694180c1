mod address;
mod handle;
mod modules;
mod reader;
pub mod string;

// Mock memory reader for testing (always available for unit and integration tests)
#[doc(hidden)]
pub mod mock;

pub use address::RemoteAddress;
pub use handle::{ProcessHandle, find_process_id, find_window_pid, main_window_title};
pub use modules::ModuleAddressCache;
pub use reader::{MemoryReader, ReadMemory};
pub use string::{SsoLayout, decode_remote_text, decode_wide_text};

#[doc(hidden)]
pub use mock::{MockMemoryBuilder, MockMemoryReader};
