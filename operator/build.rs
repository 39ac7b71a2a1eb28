use kube::CustomResourceExt;
use loputoo_types::*;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    for (path, crd) in [
        ("../crds/network.unfamousthomas.me_server_crd.yaml", Server::crd()),
        ("../crds/network.unfamousthomas.me_fleet_crd.yaml", Fleet::crd()),
        ("../crds/network.unfamousthomas.me_gametype_crd.yaml", GameType::crd()),
        (
            "../crds/network.unfamousthomas.me_gameautoscaler_crd.yaml",
            GameAutoscaler::crd(),
        ),
    ] {
        fs::write(path, serde_yaml::to_string(&crd).unwrap()).unwrap();
    }
}
