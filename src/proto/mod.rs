//! Generated gRPC types for the two collaborators.
//!
//! Only the subset of each upstream api that the agent speaks is compiled.
//! Field numbers match upstream so the agent talks to stock etcd and GoBGP.

#![allow(clippy::all)]

pub mod mvccpb {
    tonic::include_proto!("mvccpb");
}

pub mod etcdserverpb {
    tonic::include_proto!("etcdserverpb");
}

pub mod gobgpapi {
    tonic::include_proto!("gobgpapi");
}
