// Physical memory backends.
//
// A backend hands out one page at a time. Each page is a guard: the
// mapping lives exactly as long as the guard, so a read never keeps a
// mapping around after its value has been extracted.
pub mod addr;
pub mod devmem;
pub mod mapping;
pub mod simulated;

pub use addr::*;
pub use devmem::*;
pub use mapping::*;
pub use simulated::*;
