#[cotask::task]
async fn foreign() -> Result<u32, std::fmt::Error> {
    Ok(1)
}

fn main() {}
