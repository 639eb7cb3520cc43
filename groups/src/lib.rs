pub mod failback;
pub mod failrotate;
pub mod fastest;
pub mod fastest_tcp;
pub mod random;
pub mod roundrobin;

pub use failback::FailBackGroup;
pub use failrotate::FailRotateGroup;
pub use fastest::FastestGroup;
pub use fastest_tcp::FastestTcpGroup;
pub use random::RandomGroup;
pub use roundrobin::RoundRobinGroup;
