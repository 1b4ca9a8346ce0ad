use std::sync::Arc;
use tokio::task::JoinSet;

use crate::common::{SimError, SimResult};
use crate::domains::streets::StreetGraph;
use crate::domains::vehicles::Vehicle;

/// Drives every vehicle to its destination, one after another.
pub fn run_sequentially(vehicles: &mut [Vehicle], graph: &StreetGraph) -> SimResult<()> {
    vehicles.iter_mut().try_for_each(|vehicle| vehicle.drive(graph))
}

/// Drives each vehicle on its own task and waits for all of them. The
/// result keeps the input order.
pub async fn run_concurrently(
    vehicles: Vec<Vehicle>,
    graph: Arc<StreetGraph>,
) -> SimResult<Vec<Vehicle>> {
    let mut tasks = JoinSet::new();
    for (index, mut vehicle) in vehicles.into_iter().enumerate() {
        let graph = graph.clone();
        tasks.spawn(async move {
            vehicle.drive(&graph)?;
            Ok::<_, SimError>((index, vehicle))
        });
    }

    let mut done = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (index, vehicle) =
            joined.map_err(|e| SimError::protocol(format!("drive task failed: {}", e)))??;
        done.push((index, vehicle));
    }
    done.sort_by_key(|(index, _)| *index);
    Ok(done.into_iter().map(|(_, vehicle)| vehicle).collect())
}
