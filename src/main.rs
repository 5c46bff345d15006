#[macro_use]
extern crate rocket;

#[launch]
fn launch() -> _ {
    package_tracker::rocket()
}
