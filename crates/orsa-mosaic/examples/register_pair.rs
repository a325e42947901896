use image::ImageReader;
use orsa_mosaic::{Registrar, RegistrationConfig};
use std::error::Error;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <image1> <image2> <out_dir> [config.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let image1 = ImageReader::open(&args[1])?.decode()?.to_rgb8();
    let image2 = ImageReader::open(&args[2])?.decode()?.to_rgb8();
    let out_dir = PathBuf::from(&args[3]);
    std::fs::create_dir_all(&out_dir)?;

    let config = match args.get(4) {
        Some(path) => RegistrationConfig::from_json_file(Path::new(path))?,
        None => RegistrationConfig::default(),
    };

    let reg = Registrar::new(config).register_rgb(&image1, &image2)?;

    reg.inliers.to_rgb8().save(out_dir.join("in.png"))?;
    reg.outliers.to_rgb8().save(out_dir.join("out.png"))?;
    reg.warped1.to_rgb8().save(out_dir.join("im1_warped.png"))?;
    reg.warped2.to_rgb8().save(out_dir.join("im2_warped.png"))?;
    reg.mosaic.to_rgb8().save(out_dir.join("mosaic.png"))?;
    std::fs::write(
        out_dir.join("registration.json"),
        serde_json::to_string_pretty(&reg.stats)?,
    )?;

    let h = reg.homography_array();
    println!(
        "{} matches, {} inliers, log10 NFA {:.2}",
        reg.stats.matches, reg.stats.inliers, reg.stats.log_nfa
    );
    for row in h.chunks(3) {
        println!("{:12.6} {:12.6} {:12.6}", row[0], row[1], row[2]);
    }
    Ok(())
}
