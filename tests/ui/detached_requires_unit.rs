#[cotask::detached]
async fn root() -> cotask::Result<u32> {
    Ok(1)
}

fn main() {}
