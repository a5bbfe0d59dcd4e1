use console::Style;
use semsim_core::frame::Frame;
use semsim_core::library::CalibrationLibrary;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    warn: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            warn: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_library(library: &CalibrationLibrary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Calibration Library"));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Root"),
        s.path.apply_to(library.describe())
    );
    println!();

    let samples = library.samples();
    if samples.is_empty() {
        println!("  {}", s.warn.apply_to("no calibration images found"));
        return;
    }

    for sample in samples {
        println!("  {}", s.header.apply_to(&sample));
        for detector in library.detectors(&sample) {
            let mags: Vec<String> = library
                .magnifications(&sample, &detector)
                .iter()
                .map(|m| format!("{m}x"))
                .collect();
            println!(
                "    {:<12}{}",
                s.label.apply_to(&detector),
                s.value.apply_to(mags.join(", "))
            );
        }
    }
    println!();
}

pub fn print_frame_summary(frame: &Frame) {
    let s = Styles::new();
    let state = &frame.state;
    let kernel = &frame.kernel;

    println!();
    println!("  {}", s.title.apply_to("SEM Frame"));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Sample"),
        s.value.apply_to(format!("{} / {}", state.sample, state.detector))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Magnification"),
        s.value.apply_to(format!(
            "{}x requested, {}x captured",
            state.magnification, frame.effective_magnification
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Size"),
        s.value.apply_to(format!("{}x{}", frame.width(), frame.height()))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Mean level"),
        s.value.apply_to(format!("{:.3}", frame.mean()))
    );
    println!();

    println!("  {}", s.header.apply_to("Beam"));
    if kernel.is_identity() {
        println!("    {:<12}{}", s.label.apply_to("Spot"), s.value.apply_to("in focus"));
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Halfwidth"),
            s.value.apply_to(format!(
                "{:.1} x {:.1} nm",
                kernel.halfwidth_major_nm, kernel.halfwidth_minor_nm
            ))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Axis"),
            s.value.apply_to(format!("{:.1} deg", kernel.orientation.to_degrees()))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sigma"),
            s.value.apply_to(format!("{:.2} x {:.2} px", kernel.sigma_x, kernel.sigma_y))
        );
    }
    if kernel.shift_x != 0.0 || kernel.shift_y != 0.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Image shift"),
            s.warn.apply_to(format!("{:.2}, {:.2} px", kernel.shift_x, kernel.shift_y))
        );
    }
    println!();
    println!("  {}", s.label.apply_to(state.data_zone()));
    println!();
}
