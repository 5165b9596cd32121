fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["proto/etcd/rpc.proto", "proto/gobgp/gobgp.proto"],
            &["proto/etcd", "proto/gobgp"],
        )
        .unwrap_or_else(|e| panic!("protobuf compile error: {}", e));

    // Exposed by GET /v1/gitinfo
    vergen::EmitBuilder::builder()
        .git_sha(true)
        .git_branch()
        .emit()
        .expect("Unable to generate build info");

    Ok(())
}
