//! Canned demo handlers: a small in-memory repository for exercising the
//! client without a real server.

use async_trait::async_trait;
use repo_comm::{commands, keys, prefixes, CommandHandler, Message};

pub struct DemoHandlers;

#[async_trait]
impl CommandHandler for DemoHandlers {
    async fn handle(&self, command: &str, request: &Message) -> Option<Message> {
        match command {
            commands::PING => Some(alive()),
            commands::GET_REPO_PACKAGES => Some(repo_packages()),
            commands::GET_PACKAGE_FILES => Some(package_files(request)),
            commands::GET_FILE_METADATA => Some(file_metadata(request)),
            commands::GET_FILE_TEXT => Some(Message::new()),
            commands::CHECK_IN | commands::CHECK_OUT => Some(success()),
            _ => None,
        }
    }
}

fn alive() -> Message {
    let mut reply = Message::new();
    reply.insert(keys::ALIVE, "true");
    reply
}

fn success() -> Message {
    let mut reply = Message::new();
    reply.insert(keys::SUCCESS, "true");
    reply
}

fn repo_packages() -> Message {
    let mut reply = Message::new();
    reply.set_list(prefixes::PACKAGE, ["FileSystemDemo", "RepoCore"]);
    reply
}

fn package_files(request: &Message) -> Message {
    let mut reply = Message::new();
    match request.get(keys::PACKAGE) {
        Some("FileSystemDemo") => reply.set_list(
            prefixes::FILE,
            [
                "FileSystemDemo#FileSystem#FileSystem.h.1",
                "FileSystemDemo#FileSystem#FileSystem.cpp.1",
                "FileSystemDemo#FileSystem#FileSystem.h.2",
                "FileSystemDemo#FileSystem#FileSystem.cpp.2",
            ],
        ),
        Some("RepoCore") => reply.set_list(
            prefixes::FILE,
            [
                "RepoCore#SoftwareRepository#RepoCore.h.1",
                "RepoCore#SoftwareRepository#RepoCore.cpp.1",
            ],
        ),
        _ => {}
    }
    reply
}

fn file_metadata(request: &Message) -> Message {
    let mut reply = Message::new();
    match request.get(keys::FILENAME) {
        Some("FileSystem.h") | Some("FileSystem.cpp") => {
            reply.insert(keys::DESCRIPTION, "Utilities to interact with the file system");
            reply.insert(keys::AUTHOR, "jfawcett");
            reply.set_list(
                prefixes::DEPENDENCY,
                [
                    "Utilities#Utilities#Utilities.h.1",
                    "Utilities#Utilities#Utilities.cpp.1",
                ],
            );
        }
        Some("RepoCore.h") | Some("RepoCore.cpp") => {
            reply.insert(keys::DESCRIPTION, "Provides core repository semantics");
            reply.insert(keys::AUTHOR, "rgnair");
            reply.set_list(
                prefixes::DEPENDENCY,
                [
                    "FileSystemDemo#FileSystem#FileSystem.h.2",
                    "FileSystemDemo#FileSystem#FileSystem.cpp.2",
                ],
            );
        }
        _ => {}
    }
    reply
}
