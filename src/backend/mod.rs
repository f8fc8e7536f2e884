pub mod memory;
pub mod supabase;
pub mod traits;

pub use memory::MemoryBackend;
pub use supabase::{SupabaseBackend, SupabaseOptions};
pub use traits::Backend;
