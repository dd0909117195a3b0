//! Request API: one method per remote repository operation.
//!
//! Every method follows the same template: generate a correlation ID,
//! register a one-shot decoding callback under it, build the outbound
//! message, and post it. Nothing here blocks on a response; results
//! arrive through the callback, invoked on the listener task. Callers that
//! own a UI or other single-threaded resource marshal the result back onto
//! their own task (a oneshot channel works; see the console client).

use crate::comm::dispatch::{correlation_id, DispatchTable};
use crate::comm::responses::{
    CheckInResponse, CheckOutResponse, GetFileMetadataResponse, GetFileTextResponse,
    GetPackageFilesResponse, GetRepoPackagesResponse, PingResponse,
};
use crate::comm::transport::Transport;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::file_key::{FileKey, FileMetadata};
use crate::message::{commands, keys, prefixes, Message};
use std::sync::Arc;
use tracing::warn;

/// Request methods bound to one (transport, dispatch table, local endpoint,
/// server endpoint) quadruple. Obtained from
/// [`CommService::requests`](crate::comm::service::CommService::requests).
pub struct Requests {
    transport: Arc<Transport>,
    dispatch: Arc<DispatchTable>,
    local: Endpoint,
    remote: Endpoint,
}

impl Requests {
    pub(crate) fn new(
        transport: Arc<Transport>,
        dispatch: Arc<DispatchTable>,
        local: Endpoint,
        remote: Endpoint,
    ) -> Self {
        Self {
            transport,
            dispatch,
            local,
            remote,
        }
    }

    /// The repository server these requests go to.
    pub fn server(&self) -> &Endpoint {
        &self.remote
    }

    /// Check whether the repository server is alive.
    pub async fn ping<F>(&self, verbose: bool, action: F) -> Result<()>
    where
        F: FnOnce(PingResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                action(PingResponse {
                    server_active: field(&response, keys::ALIVE),
                    request_id,
                });
            }),
        );

        let message = self.request_message(commands::PING, &id, None, verbose);
        self.send(&id, message).await
    }

    /// List the packages in the repository, optionally restricted to a
    /// category.
    pub async fn get_repo_packages<F>(
        &self,
        category: Option<&str>,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(GetRepoPackagesResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                action(GetRepoPackagesResponse {
                    packages: response.read_list(prefixes::PACKAGE),
                    request_id,
                });
            }),
        );

        let mut message =
            self.request_message(commands::GET_REPO_PACKAGES, &id, Some(user_id), verbose);
        if let Some(category) = category {
            message.insert(keys::CATEGORY, category);
        }
        self.send(&id, message).await
    }

    /// List the files of `package`.
    pub async fn get_package_files<F>(
        &self,
        package: &str,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(GetPackageFilesResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                action(GetPackageFilesResponse {
                    files: file_keys(&response, prefixes::FILE),
                    request_id,
                });
            }),
        );

        let mut message =
            self.request_message(commands::GET_PACKAGE_FILES, &id, Some(user_id), verbose);
        message.insert(keys::PACKAGE, package);
        self.send(&id, message).await
    }

    /// Fetch author, description, and dependencies of `file`.
    pub async fn get_file_metadata<F>(
        &self,
        file: &FileKey,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(GetFileMetadataResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                let metadata = FileMetadata {
                    author: field(&response, keys::AUTHOR),
                    description: field(&response, keys::DESCRIPTION),
                    dependencies: file_keys(&response, prefixes::DEPENDENCY),
                };
                action(GetFileMetadataResponse {
                    metadata,
                    request_id,
                });
            }),
        );

        let mut message =
            self.request_message(commands::GET_FILE_METADATA, &id, Some(user_id), verbose);
        append_file_fields(&mut message, file);
        self.send(&id, message).await
    }

    /// Request `file`'s text. The text is delivered out of band to the
    /// local save directory; the response only acknowledges the request.
    pub async fn get_file_text<F>(
        &self,
        file: &FileKey,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(GetFileTextResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |_response| {
                action(GetFileTextResponse { request_id });
            }),
        );

        let mut message =
            self.request_message(commands::GET_FILE_TEXT, &id, Some(user_id), verbose);
        append_file_fields(&mut message, file);
        self.send(&id, message).await
    }

    /// Check `file` out of the repository, with or without its dependency
    /// closure.
    pub async fn check_out<F>(
        &self,
        file: &FileKey,
        dependencies_required: bool,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(CheckOutResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                action(CheckOutResponse {
                    success: field(&response, keys::SUCCESS),
                    request_id,
                });
            }),
        );

        let mut message = self.request_message(commands::CHECK_OUT, &id, Some(user_id), verbose);
        append_file_fields(&mut message, file);
        message.insert(keys::DEPENDENCIES_REQUIRED, dependencies_required.to_string());
        self.send(&id, message).await
    }

    /// Check one physical file into `package`. A folder check-in issues one
    /// of these per staged file; see
    /// [`check_in_folder`](crate::checkin::check_in_folder).
    #[allow(clippy::too_many_arguments)]
    pub async fn check_in<F>(
        &self,
        package: &str,
        namespace: &str,
        description: &str,
        category: Option<&str>,
        file: &str,
        user_id: &str,
        verbose: bool,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce(CheckInResponse) + Send + 'static,
    {
        let id = correlation_id();
        let request_id = id.clone();
        self.dispatch.register(
            &id,
            Box::new(move |response| {
                action(CheckInResponse {
                    success: field(&response, keys::SUCCESS),
                    request_id,
                });
            }),
        );

        let mut message = self.request_message(commands::CHECK_IN, &id, Some(user_id), verbose);
        message.insert(keys::PACKAGE, package);
        message.insert(keys::NAMESPACE, namespace);
        message.insert(keys::DESCRIPTION, description);
        if let Some(category) = category {
            message.insert(keys::CATEGORY, category);
        }
        message.insert(keys::FILE, file);
        self.send(&id, message).await
    }

    fn request_message(
        &self,
        command: &str,
        request_id: &str,
        user_id: Option<&str>,
        verbose: bool,
    ) -> Message {
        let mut message = Message::new();
        message.set_recipient(&self.remote);
        message.set_sender(&self.local);
        message.set_command(command);
        message.set_request_id(request_id);
        if let Some(user_id) = user_id {
            message.insert(keys::USER_ID, user_id);
        }
        if verbose {
            message.mark_verbose();
        }
        message
    }

    async fn send(&self, id: &str, message: Message) -> Result<()> {
        let result = self.transport.post(message).await;
        if result.is_err() {
            // No response can arrive for a request that never left.
            self.dispatch.take(id);
        }
        result
    }
}

fn append_file_fields(message: &mut Message, file: &FileKey) {
    message.insert(keys::PACKAGE, file.package.as_str());
    message.insert(keys::NAMESPACE, file.namespace.as_str());
    message.insert(keys::FILENAME, file.filename.as_str());
    message.insert(keys::VERSION, file.version.to_string());
}

fn field(response: &Message, key: &str) -> String {
    response.get(key).unwrap_or_default().to_string()
}

fn file_keys(response: &Message, prefix: &str) -> Vec<FileKey> {
    response
        .read_list(prefix)
        .into_iter()
        .filter_map(|raw| match FileKey::parse(&raw) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(%raw, error = %e, "skipping malformed file key");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn requests_for(remote: Endpoint) -> (Requests, Arc<DispatchTable>) {
        let transport = Arc::new(
            Transport::bind(&Endpoint::new("127.0.0.1", 0))
                .await
                .unwrap(),
        );
        let dispatch = Arc::new(DispatchTable::new());
        let local = transport.local().clone();
        (
            Requests::new(transport, dispatch.clone(), local, remote),
            dispatch,
        )
    }

    #[tokio::test]
    async fn test_request_message_carries_routing_and_identity() {
        let (requests, _) = requests_for(Endpoint::new("localhost", 7790)).await;

        let message = requests.request_message(commands::PING, "id-1", Some("tester"), true);
        assert_eq!(message.recipient(), Some("localhost:7790"));
        assert_eq!(message.sender().map(|s| s.starts_with("127.0.0.1:")), Some(true));
        assert_eq!(message.command(), Some(commands::PING));
        assert_eq!(message.request_id(), Some("id-1"));
        assert_eq!(message.user_id(), Some("tester"));
        assert!(message.verbose());
    }

    #[tokio::test]
    async fn test_failed_send_withdraws_registered_entry() {
        // Port 1 is never listening.
        let (requests, dispatch) = requests_for(Endpoint::new("127.0.0.1", 1)).await;

        let result = requests
            .ping(false, |_| panic!("callback for a request that never left"))
            .await;
        assert!(result.is_err());
        assert!(dispatch.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_keys_are_skipped() {
        let mut response = Message::new();
        response.set_list(prefixes::FILE, ["Logger#Logging#Logger.h.1", "garbage"]);

        let parsed = file_keys(&response, prefixes::FILE);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].package, "Logger");
    }
}
