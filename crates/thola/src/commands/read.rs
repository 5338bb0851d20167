use thola_core::RequestKind;

use crate::cli::ReadCommand;

use super::interface_options;

/// Target address and request kind of a `read` subcommand.
pub fn request(command: ReadCommand) -> (String, RequestKind) {
    match command {
        ReadCommand::AvailableComponents(args) => (args.host, RequestKind::ReadAvailableComponents),
        ReadCommand::CountInterfaces(args) => (args.host, RequestKind::ReadCountInterfaces),
        ReadCommand::Interfaces { host, filters } => (
            host.host,
            RequestKind::ReadInterfaces(interface_options(filters)),
        ),
        ReadCommand::Cpu(args) => (args.host, RequestKind::ReadCpu),
        ReadCommand::Memory(args) => (args.host, RequestKind::ReadMemory),
        ReadCommand::Ups(args) => (args.host, RequestKind::ReadUps),
        ReadCommand::Sbc(args) => (args.host, RequestKind::ReadSbc),
        ReadCommand::HardwareHealth(args) => (args.host, RequestKind::ReadHardwareHealth),
        ReadCommand::HighAvailability(args) => (args.host, RequestKind::ReadHighAvailability),
        ReadCommand::Disk(args) => (args.host, RequestKind::ReadDisk),
        ReadCommand::Siem(args) => (args.host, RequestKind::ReadSiem),
        ReadCommand::Server(args) => (args.host, RequestKind::ReadServer),
    }
}
