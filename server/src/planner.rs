//! Movement planner running next to the game loop
//!
//! Player commands don't wait for A*: the game state queues a
//! [`PathRequest`], the loop hands it to this task and the answer comes
//! back later as a regular inbound message carrying a [`PathResult`].

use crate::dispatch::{ClientMessage, Command, SERVER_ORIGIN};
use crate::pathfinder::Pathfinder;
use log::{debug, info};
use shared::{EntityId, Path, Vec2};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Request for a path from `org` to `dst` on behalf of `entity`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathRequest {
    /// Number of the command that asked for this path.
    pub request: u64,
    pub entity: EntityId,
    pub org: Vec2,
    pub dst: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub request: u64,
    pub entity: EntityId,
    /// `None` when the destination can't be reached.
    pub path: Option<Path>,
}

impl PathRequest {
    pub fn resolve(&self, pathfinder: &Pathfinder) -> PathResult {
        PathResult {
            request: self.request,
            entity: self.entity,
            path: pathfinder.find_path(self.org, self.dst),
        }
    }
}

/// Spawns the planner task.
///
/// The task stops once the request channel is closed or nobody listens to
/// the results anymore.
pub fn spawn_planner(
    pathfinder: Pathfinder,
    mut requests: mpsc::UnboundedReceiver<PathRequest>,
    results: mpsc::UnboundedSender<ClientMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let result = request.resolve(&pathfinder);
            debug!(
                "Request {} for entity {}: {}",
                result.request,
                result.entity,
                match &result.path {
                    Some(path) => format!("{} waypoints", path.len()),
                    None => "no path".to_string(),
                }
            );

            let message = ClientMessage {
                client_id: SERVER_ORIGIN,
                command: Command::PathResult(result),
            };
            if results.send(message).is_err() {
                break;
            }
        }
        info!("Movement planner stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Grid;
    use std::sync::Arc;

    fn pathfinder() -> Pathfinder {
        Pathfinder::new(Arc::new(Grid::open(10, 10, 1.0)))
    }

    #[test]
    fn test_resolve_keeps_request_identity() {
        let request = PathRequest {
            request: 12,
            entity: 3,
            org: Vec2::new(0.2, 0.2),
            dst: Vec2::new(5.7, 3.1),
        };
        let result = request.resolve(&pathfinder());

        assert_eq!(result.request, 12);
        assert_eq!(result.entity, 3);
        let path = result.path.expect("destination is reachable");
        assert_eq!(path.first(), Some(&Vec2::new(0.2, 0.2)));
        assert_eq!(path.last(), Some(&Vec2::new(5.7, 3.1)));
    }

    #[test]
    fn test_resolve_reports_unreachable() {
        let request = PathRequest {
            request: 1,
            entity: 1,
            org: Vec2::new(1.0, 1.0),
            dst: Vec2::new(50.0, 1.0),
        };
        assert_eq!(request.resolve(&pathfinder()).path, None);
    }

    #[tokio::test]
    async fn test_planner_answers_through_inbound_queue() {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let handle = spawn_planner(pathfinder(), request_rx, result_tx);

        request_tx
            .send(PathRequest {
                request: 4,
                entity: 9,
                org: Vec2::new(1.5, 1.5),
                dst: Vec2::new(8.5, 1.5),
            })
            .unwrap();

        let message = result_rx.recv().await.unwrap();
        assert_eq!(message.client_id, SERVER_ORIGIN);
        match message.command {
            Command::PathResult(result) => {
                assert_eq!(result.request, 4);
                assert_eq!(
                    result.path,
                    Some(vec![Vec2::new(1.5, 1.5), Vec2::new(8.5, 1.5)])
                );
            }
            other => panic!("unexpected command {:?}", other),
        }

        drop(request_tx);
        tokio_test::assert_ok!(handle.await);
    }
}
