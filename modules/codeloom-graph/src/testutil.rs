//! Disposable graph-store containers for integration tests.

use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use crate::GraphClient;

const BOLT_PORT: u16 = 7687;

/// Everything backend-specific about the store image, kept as data so a
/// version bump, an enterprise image, or an auth change touches one
/// constant instead of the startup code.
struct StoreImage {
    image: &'static str,
    tag: &'static str,
    /// Stdout line that marks the server as ready to accept bolt
    /// connections.
    ready_line: &'static str,
    auth_env: Option<(&'static str, &'static str)>,
}

const NEO4J: StoreImage = StoreImage {
    image: "neo4j",
    tag: "5",
    ready_line: "Started.",
    auth_env: Some(("NEO4J_AUTH", "none")),
};

/// Start a throwaway Neo4j and hand back a connected client.
///
/// The container stops when its handle drops, so tests must keep the
/// handle bound for their whole body.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let StoreImage {
        image,
        tag,
        ready_line,
        auth_env,
    } = NEO4J;

    let base = GenericImage::new(image, tag)
        .with_exposed_port(ContainerPort::Tcp(BOLT_PORT))
        .with_wait_for(WaitFor::message_on_stdout(ready_line));
    let started = match auth_env {
        Some((key, value)) => base.with_env_var(key, value).start().await,
        None => base.start().await,
    };
    let container = match started {
        Ok(container) => container,
        Err(e) => panic!("graph store container failed to start: {e}"),
    };

    let bolt = container
        .get_host_port_ipv4(BOLT_PORT)
        .await
        .unwrap_or_else(|e| panic!("no mapped bolt port: {e}"));
    let client = GraphClient::connect(&format!("bolt://127.0.0.1:{bolt}"), "", "")
        .await
        .unwrap_or_else(|e| panic!("cannot reach graph store container: {e}"));

    (container, client)
}
