pub mod a12;
pub mod bus;
pub mod cartridge;
pub mod error;
pub mod irq;
pub mod mapper;
pub mod savestate;

pub use a12::{A12EdgeFilter, A12Watcher, DEFAULT_FILTER_WINDOW};
pub use bus::{BusEvent, CartridgeBus, Timeline};
pub use cartridge::Cartridge;
pub use error::{MapperError, StateError};
pub use irq::{A12Irq, IrqConfig, IrqCounter};
pub use mapper::{BankRegion, Mapper, Mirroring, create_mapper, mapper_name};
pub use savestate::MapperState;
